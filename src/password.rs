//! Password strength validation and hashing.

use bcrypt::{DEFAULT_COST, hash, verify};

use crate::Error;

/// A password that has passed the strength check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPassword(String);

impl ValidatedPassword {
    /// Validate the strength of a raw password.
    ///
    /// # Errors
    /// Returns [Error::TooWeak] with the strength checker's feedback if the
    /// password is too easy to guess.
    pub fn new(raw_password: &str) -> Result<Self, Error> {
        let entropy = zxcvbn::zxcvbn(raw_password, &[]);

        if entropy.score() < zxcvbn::Score::Three {
            let feedback = entropy
                .feedback()
                .and_then(|feedback| feedback.warning())
                .map(|warning| warning.to_string())
                .unwrap_or_else(|| "try a longer or less predictable password".to_owned());

            return Err(Error::TooWeak(feedback));
        }

        Ok(Self(raw_password.to_owned()))
    }

    /// Create a validated password without running the strength check.
    ///
    /// The caller should ensure the password came from a trusted source,
    /// e.g. a test fixture.
    pub fn new_unchecked(raw_password: &str) -> Self {
        Self(raw_password.to_owned())
    }
}

/// A bcrypt hash of a user's password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a validated password with the default bcrypt cost.
    ///
    /// # Errors
    /// Returns [Error::HashingError] if the underlying hashing library
    /// fails. The error string should only be logged on the server.
    pub fn new(password: ValidatedPassword) -> Result<Self, Error> {
        Self::with_cost(password, DEFAULT_COST)
    }

    /// Hash a validated password with an explicit bcrypt cost.
    ///
    /// Lower costs are useful in tests where the default cost would
    /// dominate the run time.
    pub fn with_cost(password: ValidatedPassword, cost: u32) -> Result<Self, Error> {
        hash(&password.0, cost)
            .map(Self)
            .map_err(|error| Error::HashingError(error.to_string()))
    }

    /// Wrap an existing hash string, e.g. one loaded from the database.
    pub fn new_unchecked(hash: String) -> Self {
        Self(hash)
    }

    /// Check a raw password against this hash.
    ///
    /// # Errors
    /// Returns [Error::HashingError] if the stored hash is malformed.
    pub fn verify(&self, raw_password: &str) -> Result<bool, Error> {
        verify(raw_password, &self.0).map_err(|error| Error::HashingError(error.to_string()))
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
