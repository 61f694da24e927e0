//! cloud-init userdata for SSH key provisioning

use crate::error::{ProviderError, Result};
use crate::schema::MAX_SSH_KEYS;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SHELL: &str = "/bin/bash";

/// One declared `ssh_keys` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    pub user: String,
    pub public_key: String,
    #[serde(default)]
    pub shell: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CloudUser {
    #[serde(rename = "ssh-authorized-keys")]
    ssh_authorized_keys: Vec<String>,
    shell: String,
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CloudConfig {
    users: Vec<CloudUser>,
}

/// Encode keys as cloud-init userdata. No keys encode as an empty string,
/// which callers treat as "send no userdata".
pub fn encode(keys: &[SshKey]) -> Result<String> {
    if keys.is_empty() {
        return Ok(String::new());
    }
    if keys.len() > MAX_SSH_KEYS {
        return Err(ProviderError::validation(format!(
            "at most {} ssh_keys allowed, got {}",
            MAX_SSH_KEYS,
            keys.len()
        )));
    }

    let users = keys
        .iter()
        .map(|k| CloudUser {
            ssh_authorized_keys: vec![k.public_key.clone()],
            shell: if k.shell.is_empty() {
                DEFAULT_SHELL.to_string()
            } else {
                k.shell.clone()
            },
            name: k.user.clone(),
        })
        .collect();

    serde_json::to_string(&CloudConfig { users })
        .map_err(|e| ProviderError::validation(format!("cannot encode ssh_keys: {}", e)))
}

/// Inverse of [`encode`]
pub fn decode(userdata: &str) -> Result<Vec<SshKey>> {
    if userdata.is_empty() {
        return Ok(Vec::new());
    }
    let config: CloudConfig = serde_json::from_str(userdata)
        .map_err(|e| ProviderError::validation(format!("malformed userdata: {}", e)))?;
    Ok(config
        .users
        .into_iter()
        .map(|u| SshKey {
            public_key: u.ssh_authorized_keys.into_iter().next().unwrap_or_default(),
            shell: u.shell,
            user: u.name,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user: &str, shell: &str) -> SshKey {
        SshKey {
            user: user.to_string(),
            public_key: format!("ssh-ed25519 AAAA{}", user),
            shell: shell.to_string(),
        }
    }

    #[test]
    fn test_encode_exact_shape() {
        let encoded = encode(&[key("ops", "")]).unwrap();
        assert_eq!(
            encoded,
            r#"{"users":[{"ssh-authorized-keys":["ssh-ed25519 AAAAops"],"shell":"/bin/bash","name":"ops"}]}"#
        );
    }

    #[test]
    fn test_round_trip_preserves_order_and_defaults_shell() {
        let keys = vec![key("alice", "/bin/zsh"), key("bob", ""), key("carol", "/bin/sh")];
        let decoded = decode(&encode(&keys).unwrap()).unwrap();

        let users: Vec<&str> = decoded.iter().map(|k| k.user.as_str()).collect();
        assert_eq!(users, vec!["alice", "bob", "carol"]);
        assert_eq!(decoded[0].shell, "/bin/zsh");
        assert_eq!(decoded[1].shell, DEFAULT_SHELL);
        assert_eq!(decoded[2].public_key, "ssh-ed25519 AAAAcarol");
    }

    #[test]
    fn test_empty_is_empty_string() {
        assert_eq!(encode(&[]).unwrap(), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_too_many_keys() {
        let keys: Vec<SshKey> = (0..13).map(|i| key(&format!("u{}", i), "")).collect();
        assert!(matches!(encode(&keys), Err(ProviderError::Validation(_))));
    }
}
