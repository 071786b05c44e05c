//! Cache keys and resource kinds.

use std::fmt;

/// Resource namespaces cached by the portal screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// The portfolio's loan list.
    LoanDocuments,
    /// A single loan document record.
    LoanDetail,
    /// Repayment schedule of a single loan.
    LoanSchedule,
    /// Combined portfolio, maturity and high-risk reports.
    ReportData,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::LoanDocuments,
        ResourceKind::LoanDetail,
        ResourceKind::LoanSchedule,
        ResourceKind::ReportData,
    ];

    /// Get the namespace string used in storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::LoanDocuments => "loanDocuments",
            ResourceKind::LoanDetail => "loanDetail",
            ResourceKind::LoanSchedule => "loanSchedule",
            ResourceKind::ReportData => "reportData",
        }
    }
}

impl AsRef<str> for ResourceKind {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one cache entry: `(user_id, kind, id?)`.
///
/// Persisted as `"<kind>:<user_id>[:<id>]"`. The user id and the resource id
/// are percent-encoded, so `:` only ever appears as the separator and two
/// users never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: String,
    pub kind: ResourceKind,
    pub id: Option<String>,
}

impl CacheKey {
    pub fn new(user_id: &str, kind: ResourceKind, id: Option<&str>) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            id: id.map(str::to_string),
        }
    }

    /// The key string used in the key/value backend.
    pub fn storage_key(&self) -> String {
        let user_id = urlencoding::encode(&self.user_id);
        match &self.id {
            Some(id) => format!("{}:{}:{}", self.kind, user_id, urlencoding::encode(id)),
            None => format!("{}:{}", self.kind, user_id),
        }
    }

    /// True if `storage_key` names a cache entry owned by `user_id`.
    ///
    /// Keys that do not start with a known resource kind (credential keys)
    /// never match.
    pub fn belongs_to(storage_key: &str, user_id: &str) -> bool {
        let Some((kind, rest)) = storage_key.split_once(':') else {
            return false;
        };
        if !ResourceKind::ALL.iter().any(|known| known.as_str() == kind) {
            return false;
        }
        let owner = rest.split_once(':').map_or(rest, |(owner, _id)| owner);
        owner == urlencoding::encode(user_id)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
