use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("access denied")]
    AccessDenied,

    #[error("user not found")]
    UserNotFound,

    #[error("user is inactive")]
    UserInactive,

    #[error("team not found")]
    TeamNotFound,

    #[error("team already exists")]
    TeamExists,

    #[error("commit not found")]
    CommitNotFound,

    #[error("root commit not found")]
    RootCommitNotFound,

    #[error("invalid parent commit")]
    InvalidParent,

    #[error("only leaf commits can be merged")]
    CommitNotLeaf,

    #[error("commit name already exists")]
    CommitNameExists,

    #[error("pull request not found")]
    PrNotFound,

    #[error("pull request already exists")]
    PrExists,

    #[error("pull request already merged")]
    PrMerged,

    #[error("pull request is not open")]
    PrNotOpen,

    #[error("pull request was rejected")]
    PrRejected,

    #[error("user is not a reviewer of this pull request")]
    NotReviewer,

    #[error("not all reviewers have approved")]
    NotAllApproved,

    #[error("no active replacement candidate in team")]
    NoCandidate,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable wire code for this error kind, per the API contract.
    pub fn code(&self) -> &'static str {
        match self {
            Error::AccessDenied => "ACCESS_DENIED",
            Error::UserNotFound => "USER_NOT_FOUND",
            Error::UserInactive => "USER_INACTIVE",
            Error::TeamNotFound => "TEAM_NOT_FOUND",
            Error::TeamExists => "TEAM_EXISTS",
            Error::CommitNotFound => "COMMIT_NOT_FOUND",
            Error::RootCommitNotFound => "ROOT_COMMIT_NOT_FOUND",
            Error::InvalidParent => "INVALID_PARENT",
            Error::CommitNotLeaf => "COMMIT_NOT_LEAF",
            Error::CommitNameExists => "COMMIT_NAME_EXISTS",
            Error::PrNotFound => "PR_NOT_FOUND",
            Error::PrExists => "PR_ALREADY_EXISTS",
            Error::PrMerged => "PR_ALREADY_MERGED",
            // The taxonomy has no PR_REJECTED; a rejected PR is a non-open PR.
            Error::PrNotOpen | Error::PrRejected => "PR_NOT_OPEN",
            Error::NotReviewer => "NOT_REVIEWER",
            Error::NotAllApproved => "NOT_ALL_APPROVED",
            Error::NoCandidate => "NO_CANDIDATE",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// Rebuild an error kind from a wire code received from another service.
    ///
    /// Codes never change meaning across a hop; anything unrecognized is an
    /// internal failure of the upstream.
    pub fn from_wire(code: &str, message: &str) -> Self {
        match code {
            "ACCESS_DENIED" => Error::AccessDenied,
            "USER_NOT_FOUND" => Error::UserNotFound,
            "USER_INACTIVE" => Error::UserInactive,
            "TEAM_NOT_FOUND" => Error::TeamNotFound,
            "TEAM_EXISTS" => Error::TeamExists,
            "COMMIT_NOT_FOUND" => Error::CommitNotFound,
            "ROOT_COMMIT_NOT_FOUND" => Error::RootCommitNotFound,
            "INVALID_PARENT" => Error::InvalidParent,
            "COMMIT_NOT_LEAF" => Error::CommitNotLeaf,
            "COMMIT_NAME_EXISTS" => Error::CommitNameExists,
            "PR_NOT_FOUND" => Error::PrNotFound,
            "PR_ALREADY_EXISTS" => Error::PrExists,
            "PR_ALREADY_MERGED" => Error::PrMerged,
            "PR_NOT_OPEN" => Error::PrNotOpen,
            "NOT_REVIEWER" => Error::NotReviewer,
            "NOT_ALL_APPROVED" => Error::NotAllApproved,
            "NO_CANDIDATE" => Error::NoCandidate,
            "INVALID_REQUEST" => Error::InvalidRequest(message.to_string()),
            _ => Error::Internal(message.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_round_trip() {
        for err in [
            Error::AccessDenied,
            Error::UserNotFound,
            Error::UserInactive,
            Error::TeamNotFound,
            Error::TeamExists,
            Error::CommitNotFound,
            Error::RootCommitNotFound,
            Error::InvalidParent,
            Error::CommitNotLeaf,
            Error::CommitNameExists,
            Error::PrNotFound,
            Error::PrExists,
            Error::PrMerged,
            Error::NotReviewer,
            Error::NotAllApproved,
            Error::NoCandidate,
        ] {
            let code = err.code();
            assert_eq!(Error::from_wire(code, "x").code(), code);
        }
    }

    #[test]
    fn rejected_shares_the_not_open_code() {
        assert_eq!(Error::PrRejected.code(), "PR_NOT_OPEN");
        assert_eq!(Error::PrNotOpen.code(), "PR_NOT_OPEN");
    }

    #[test]
    fn unknown_wire_code_is_internal() {
        assert_eq!(Error::from_wire("WAT", "boom").code(), "INTERNAL_ERROR");
    }
}
