//! The API endpoint URIs.

/// The health probe, reachable without authentication.
pub const HEALTH: &str = "/api/health";
/// The route for registering a user.
pub const USERS: &str = "/api/users";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/log_in";
/// The route for logging out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route for changing the current user's password.
pub const CHANGE_PASSWORD: &str = "/api/users/password";

/// The route for creating a family.
pub const FAMILIES: &str = "/api/families";
/// The route for reading the caller's family.
pub const FAMILY: &str = "/api/family";
/// The route for joining an existing family.
pub const JOIN_FAMILY: &str = "/api/family/join";
/// The route for leaving the caller's family.
pub const LEAVE_FAMILY: &str = "/api/family/leave";

/// The route for listing and creating accounts.
pub const ACCOUNTS: &str = "/api/accounts";
/// The route for updating and soft-deleting a single account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";
/// The route for restoring a soft-deleted account.
pub const RESTORE_ACCOUNT: &str = "/api/accounts/{account_id}/restore";
/// The route for restoring several soft-deleted accounts at once.
pub const BULK_RESTORE_ACCOUNTS: &str = "/api/accounts/bulk_restore";
/// The route for permanently deleting several soft-deleted accounts at once.
pub const BULK_PURGE_ACCOUNTS: &str = "/api/accounts/bulk_purge";
/// The route for recomputing an account balance from its transactions.
pub const RECALCULATE_ACCOUNT: &str = "/api/accounts/{account_id}/recalculate";
/// The route for refreshing an account's daily balance snapshot.
pub const ACCOUNT_DAILY_BALANCE: &str = "/api/accounts/{account_id}/daily_balance";

/// The route for listing and creating categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route for updating and soft-deleting a single category.
pub const CATEGORY: &str = "/api/categories/{category_id}";
/// The route for restoring a soft-deleted category.
pub const RESTORE_CATEGORY: &str = "/api/categories/{category_id}/restore";
/// The route for permanently deleting a soft-deleted category.
pub const PURGE_CATEGORY: &str = "/api/categories/{category_id}/purge";
/// The route for restoring several soft-deleted categories at once.
pub const BULK_RESTORE_CATEGORIES: &str = "/api/categories/bulk_restore";
/// The route for permanently deleting several soft-deleted categories at once.
pub const BULK_PURGE_CATEGORIES: &str = "/api/categories/bulk_purge";

/// The route for listing and creating tags.
pub const TAGS: &str = "/api/tags";
/// The route for updating and soft-deleting a single tag.
pub const TAG: &str = "/api/tags/{tag_id}";
/// The route for restoring a soft-deleted tag.
pub const RESTORE_TAG: &str = "/api/tags/{tag_id}/restore";
/// The route for permanently deleting a soft-deleted tag.
pub const PURGE_TAG: &str = "/api/tags/{tag_id}/purge";
/// The route for restoring several soft-deleted tags at once.
pub const BULK_RESTORE_TAGS: &str = "/api/tags/bulk_restore";
/// The route for permanently deleting several soft-deleted tags at once.
pub const BULK_PURGE_TAGS: &str = "/api/tags/bulk_purge";

/// The route for listing and creating transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route for updating and soft-deleting a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";

/// The route for listing and creating recurring transaction rules.
pub const RECURRING_TRANSACTIONS: &str = "/api/recurring_transactions";
/// The route for updating and soft-deleting a single recurring rule.
pub const RECURRING_TRANSACTION: &str = "/api/recurring_transactions/{recurring_transaction_id}";
/// The route for generating ledger transactions from recurring rules.
pub const GENERATE_RECURRING: &str = "/api/recurring_transactions/generate";
