//! Defines functions for handling the session cookie.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::Error;

/// The name of the cookie carrying the session id.
pub(crate) const COOKIE_SESSION: &str = "session";

/// Add the session cookie to the cookie jar, indicating that a user is
/// logged in.
///
/// `max_age` should match the TTL of the server-side session so that the
/// browser drops the cookie around the time the session stops validating.
///
/// Returns the cookie jar with the cookie added.
pub(crate) fn set_session_cookie(
    jar: PrivateCookieJar,
    session_id: &str,
    max_age: Duration,
) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION, session_id.to_owned()))
            .path("/")
            .max_age(max_age)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Set the session cookie to an invalid value and set its max age to zero,
/// which should delete the cookie on the client side.
pub(crate) fn invalidate_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_SESSION, "deleted"))
            .path("/")
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Read the session id from the private cookie jar.
///
/// # Errors
/// Returns [Error::NotAuthenticated] if the cookie is absent, which also
/// covers cookies that failed decryption or signature checks.
pub(crate) fn get_session_id_from_cookies(jar: &PrivateCookieJar) -> Result<String, Error> {
    jar.get(COOKIE_SESSION)
        .map(|cookie| cookie.value_trimmed().to_owned())
        .ok_or(Error::NotAuthenticated)
}

#[cfg(test)]
mod cookie_tests {
    use axum_extra::extract::{PrivateCookieJar, cookie::Key};
    use sha2::{Digest, Sha512};
    use time::{Duration, OffsetDateTime};

    use crate::Error;

    use super::{
        COOKIE_SESSION, get_session_id_from_cookies, invalidate_session_cookie,
        set_session_cookie,
    };

    fn get_jar() -> PrivateCookieJar {
        let hash = Sha512::digest(b"foobar");
        let key = Key::from(&hash);

        PrivateCookieJar::new(key)
    }

    #[test]
    fn can_set_and_read_session_cookie() {
        let jar = set_session_cookie(get_jar(), "deadbeef", Duration::hours(24));

        let got = get_session_id_from_cookies(&jar).unwrap();

        assert_eq!(got, "deadbeef");
    }

    #[test]
    fn session_cookie_attributes_are_strict() {
        let jar = set_session_cookie(get_jar(), "deadbeef", Duration::hours(24));
        let cookie = jar.get(COOKIE_SESSION).unwrap();

        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(
            cookie.same_site(),
            Some(axum_extra::extract::cookie::SameSite::Strict)
        );
        assert_eq!(cookie.max_age(), Some(Duration::hours(24)));
    }

    #[test]
    fn missing_cookie_is_not_authenticated() {
        assert_eq!(
            get_session_id_from_cookies(&get_jar()),
            Err(Error::NotAuthenticated)
        );
    }

    #[test]
    fn invalidate_session_cookie_succeeds() {
        let jar = set_session_cookie(get_jar(), "deadbeef", Duration::hours(24));

        let jar = invalidate_session_cookie(jar);
        let cookie = jar.get(COOKIE_SESSION).unwrap();

        assert_eq!(cookie.value(), "deleted");
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
