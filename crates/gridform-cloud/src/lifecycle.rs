//! CRUD operation deadlines

use crate::error::CloudError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudOp {
    Create,
    Read,
    Update,
    Delete,
    Exists,
}

impl std::fmt::Display for CrudOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrudOp::Create => write!(f, "create"),
            CrudOp::Read => write!(f, "read"),
            CrudOp::Update => write!(f, "update"),
            CrudOp::Delete => write!(f, "delete"),
            CrudOp::Exists => write!(f, "exists"),
        }
    }
}

/// Deadline per operation
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
    pub default: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(180),
            read: Duration::from_secs(30),
            update: Duration::from_secs(180),
            delete: Duration::from_secs(60),
            default: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    pub fn for_op(&self, op: CrudOp) -> Duration {
        match op {
            CrudOp::Create => self.create,
            CrudOp::Read => self.read,
            CrudOp::Update => self.update,
            CrudOp::Delete => self.delete,
            CrudOp::Exists => self.default,
        }
    }
}

/// Run `fut` under the deadline for `op`. On expiry the future is dropped,
/// which cancels any in-flight request; nothing is rolled back.
pub async fn with_deadline<T, E, F>(op: CrudOp, timeouts: &Timeouts, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<CloudError>,
{
    let limit = timeouts.for_op(op);
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(%op, seconds = limit.as_secs(), "Operation deadline exceeded");
            Err(CloudError::Timeout(format!("{} exceeded {}s", op, limit.as_secs())).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_deadlines() {
        let t = Timeouts::default();
        assert_eq!(t.for_op(CrudOp::Create), Duration::from_secs(180));
        assert_eq!(t.for_op(CrudOp::Read), Duration::from_secs(30));
        assert_eq!(t.for_op(CrudOp::Update), Duration::from_secs(180));
        assert_eq!(t.for_op(CrudOp::Delete), Duration::from_secs(60));
        assert_eq!(t.for_op(CrudOp::Exists), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let t = Timeouts {
            read: Duration::from_millis(10),
            ..Timeouts::default()
        };
        let result: Result<(), CloudError> = with_deadline(CrudOp::Read, &t, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CloudError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let result: Result<u32, CloudError> =
            with_deadline(CrudOp::Create, &Timeouts::default(), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
