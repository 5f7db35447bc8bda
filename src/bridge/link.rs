//! The control link contract.
//!
//! A [`Connector`] opens sessions; a [`ControlLink`] is one open session.
//! Neither retries: the bridge engine owns the retry policy and treats
//! every failure uniformly as "link is down".

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ObsSettings;
use crate::error::{CallError, ConnectError};

/// Host, port and credential of the control server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl ConnectTarget {
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }
}

impl From<&ObsSettings> for ConnectTarget {
    fn from(s: &ObsSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            password: s.password.clone(),
        }
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &ConnectTarget) -> Result<Box<dyn ControlLink>, ConnectError>;
}

/// One established session. Calls are issued one at a time.
#[async_trait]
pub trait ControlLink: Send {
    async fn get_scene(&mut self) -> Result<String, CallError>;

    async fn set_scene(&mut self, name: &str) -> Result<(), CallError>;

    /// Linear multiplier, not percent.
    async fn get_volume(&mut self, source: &str) -> Result<f64, CallError>;

    async fn set_volume(&mut self, source: &str, multiplier: f64) -> Result<(), CallError>;
}

/// Run one link call with an upper bound; elapsing is a [`CallError::Timeout`].
pub async fn bounded<T, F>(request: &'static str, after: Duration, call: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T, CallError>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(CallError::Timeout { request, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_url() {
        let t = ConnectTarget {
            host: "10.0.0.2".into(),
            port: 4455,
            password: String::new(),
        };
        assert_eq!(t.url(), "ws://10.0.0.2:4455");
    }

    #[test]
    fn test_target_from_settings() {
        let t = ConnectTarget::from(&ObsSettings::default());
        assert_eq!(t.host, "localhost");
        assert_eq!(t.port, 4455);
    }

    #[tokio::test]
    async fn test_bounded_passes_through_result() {
        let ok: Result<u32, CallError> = bounded("GetX", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let res: Result<(), CallError> = bounded("GetX", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(res, Err(CallError::Timeout { request: "GetX", .. })));
    }
}
