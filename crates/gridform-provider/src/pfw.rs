//! Port-forward rules of a compute
//!
//! The resource is addressed by its compute; the bag id is the compute id.
//! Rules are matched on `(public_port_start, public_port_end, local_port,
//! proto)`, with an unset end meaning a single port.

use crate::context::ProviderContext;
use crate::error::{ProviderError, Result};
use crate::flatten::flatten_pfw;
use crate::resolver::is_not_found;
use crate::resource::{Resource, numeric_id};
use crate::schema::pfw_schema;
use async_trait::async_trait;
use gridform_cloud::{BestEffort, ListDelta, ResourceData, Schema};
use gridform_platform::models::decode_list;
use gridform_platform::{Params, PfwRuleRecord, endpoints};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PfwRule {
    pub public_port_start: u32,
    #[serde(default)]
    pub public_port_end: u32,
    pub local_port: u32,
    pub proto: String,
    #[serde(default)]
    pub rule_id: u64,
}

impl PfwRule {
    fn end(&self) -> u32 {
        if self.public_port_end == 0 {
            self.public_port_start
        } else {
            self.public_port_end
        }
    }

    fn same_rule(&self, other: &PfwRule) -> bool {
        self.public_port_start == other.public_port_start
            && self.end() == other.end()
            && self.local_port == other.local_port
            && self.proto == other.proto
    }
}

impl fmt::Display for PfwRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}->{}/{}",
            self.public_port_start,
            self.end(),
            self.local_port,
            self.proto
        )
    }
}

pub struct PfwResource;

impl PfwResource {
    fn compute_id(d: &ResourceData) -> Result<u64> {
        match d.get_u64("compute_id") {
            0 => match numeric_id(d) {
                0 => Err(ProviderError::validation("port forwarding requires compute_id")),
                id => Ok(id),
            },
            id => Ok(id),
        }
    }

    /// Rules on the compute, `None` when the compute does not exist
    async fn list(ctx: &ProviderContext, compute_id: u64) -> Result<Option<Vec<PfwRuleRecord>>> {
        let params = Params::new().with("computeId", compute_id);
        match ctx.post(endpoints::COMPUTE_PFW_LIST, &params).await {
            Ok(body) => Ok(Some(decode_list(endpoints::COMPUTE_PFW_LIST, &body)?)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn apply(ctx: &ProviderContext, compute_id: u64, delta: &ListDelta<PfwRule>) -> Result<()> {
        let mut run = BestEffort::new("rules");
        for rule in &delta.detach {
            let params = Params::new()
                .with("computeId", compute_id)
                .with("ruleId", rule.rule_id);
            let result = ctx.post(endpoints::COMPUTE_PFW_DEL, &params).await;
            if run.record(rule, result.map(|_| ())) {
                info!(compute_id, rule = %rule, "Removed port forward");
            }
        }
        for rule in &delta.attach {
            let params = Params::new()
                .with("computeId", compute_id)
                .with("publicPortStart", rule.public_port_start)
                .with("publicPortEnd", rule.end())
                .with("localBasePort", rule.local_port)
                .with("proto", &rule.proto);
            let result = ctx.post(endpoints::COMPUTE_PFW_ADD, &params).await;
            if run.record(rule, result.map(|_| ())) {
                info!(compute_id, rule = %rule, "Added port forward");
            }
        }
        run.finish()
    }
}

#[async_trait]
impl Resource for PfwResource {
    fn kind(&self) -> &'static str {
        "pfw"
    }

    fn schema(&self) -> Schema {
        pfw_schema()
    }

    async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let compute_id = Self::compute_id(d)?;
        d.partial(true);
        d.set_id(compute_id.to_string());
        d.set_partial("compute_id");

        let rules: Vec<PfwRule> = d.get_as("rules")?.unwrap_or_default();
        let result = Self::apply(ctx, compute_id, &ListDelta::plan_by(&[], &rules, PfwRule::same_rule)).await;
        if result.is_ok() {
            d.set_partial("rules");
            d.partial(false);
        }

        let read = self.read(ctx, d).await;
        result?;
        read
    }

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let compute_id = Self::compute_id(d)?;
        match Self::list(ctx, compute_id).await? {
            Some(rules) => flatten_pfw(compute_id, &rules, d),
            None => d.set_id(""),
        }
        Ok(())
    }

    async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let compute_id = Self::compute_id(d)?;
        d.partial(true);
        d.set_partial("compute_id");

        let (old, new): (Vec<PfwRule>, Vec<PfwRule>) = d.get_change_as("rules")?;
        let delta = ListDelta::plan_by(&old, &new, PfwRule::same_rule);
        let result = Self::apply(ctx, compute_id, &delta).await;
        if result.is_ok() {
            d.set_partial("rules");
            d.partial(false);
        }

        let read = self.read(ctx, d).await;
        result?;
        read
    }

    async fn delete(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()> {
        let compute_id = Self::compute_id(d)?;
        let Some(observed) = Self::list(ctx, compute_id).await? else {
            d.set_id("");
            return Ok(());
        };

        let rules: Vec<PfwRule> = observed
            .iter()
            .map(|r| PfwRule {
                public_port_start: r.public_port_start,
                public_port_end: r.public_port_end,
                local_port: r.local_port,
                proto: r.protocol.clone(),
                rule_id: r.id,
            })
            .collect();
        Self::apply(ctx, compute_id, &ListDelta::plan(&rules, &[])).await?;
        d.set_id("");
        Ok(())
    }

    async fn exists(&self, ctx: &ProviderContext, d: &ResourceData) -> Result<bool> {
        let compute_id = Self::compute_id(d)?;
        Ok(Self::list(ctx, compute_id)
            .await?
            .is_some_and(|rules| !rules.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridform_cloud::ResourceState;
    use gridform_platform::mock::{MockPlatform, MockReply};
    use serde_json::json;
    use std::sync::Arc;

    const RULES: &str = r#"[
        {"id": 1, "publicPortStart": 2222, "publicPortEnd": 2222, "localPort": 22, "protocol": "tcp", "localIp": "10.0.0.5", "vmId": 9001},
        {"id": 2, "publicPortStart": 8080, "publicPortEnd": 8080, "localPort": 80, "protocol": "tcp", "localIp": "10.0.0.5", "vmId": 9001}
    ]"#;

    fn ctx(mock: &Arc<MockPlatform>) -> ProviderContext {
        ProviderContext::new(mock.clone(), 212)
    }

    #[tokio::test]
    async fn test_update_rule_delta() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(endpoints::COMPUTE_PFW_DEL, "true")
            .on(endpoints::COMPUTE_PFW_ADD, "3")
            .on(endpoints::COMPUTE_PFW_LIST, RULES);

        let state = ResourceState::new("9001", "pfw")
            .with_attribute("compute_id", json!(9001))
            .with_attribute(
                "rules",
                json!([
                    {"rule_id": 1, "public_port_start": 2222, "public_port_end": 2222, "local_port": 22, "proto": "tcp"},
                    {"rule_id": 2, "public_port_start": 8080, "public_port_end": 8080, "local_port": 80, "proto": "tcp"}
                ]),
            );
        let config = json!({
            "compute_id": 9001,
            "rules": [
                {"public_port_start": 2222, "local_port": 22, "proto": "tcp"},
                {"public_port_start": 4443, "local_port": 443, "proto": "tcp"}
            ]
        });
        let mut d = ResourceData::from_state(&state, config.as_object().cloned().unwrap());
        PfwResource.update(&ctx(&mock), &mut d).await.unwrap();

        let deleted = mock.calls_to(endpoints::COMPUTE_PFW_DEL);
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].param("ruleId"), Some("2"));

        let added = mock.calls_to(endpoints::COMPUTE_PFW_ADD);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].param("publicPortEnd"), Some("4443"));
        assert_eq!(added[0].param("localBasePort"), Some("443"));
        assert!(!d.is_partial());
    }

    #[tokio::test]
    async fn test_create_partial_on_failure() {
        let mock = Arc::new(MockPlatform::new());
        mock.once(endpoints::COMPUTE_PFW_ADD, MockReply::fail(409, "port in use"))
            .on(endpoints::COMPUTE_PFW_ADD, "3")
            .on(endpoints::COMPUTE_PFW_LIST, "[]");

        let config = json!({
            "compute_id": 9001,
            "rules": [
                {"public_port_start": 2222, "local_port": 22, "proto": "tcp"},
                {"public_port_start": 8080, "local_port": 80, "proto": "tcp"}
            ]
        });
        let mut d = ResourceData::new(config.as_object().cloned().unwrap());
        let err = PfwResource.create(&ctx(&mock), &mut d).await.unwrap_err();
        assert!(err.to_string().contains("port in use"));
        assert_eq!(mock.calls_to(endpoints::COMPUTE_PFW_ADD).len(), 2);
        assert_eq!(d.id(), "9001");
        assert_eq!(d.pending(), vec!["rules".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_removes_observed_rules() {
        let mock = Arc::new(MockPlatform::new());
        mock.on(endpoints::COMPUTE_PFW_LIST, RULES)
            .on(endpoints::COMPUTE_PFW_DEL, "true");

        let config = json!({"compute_id": 9001});
        let mut d = ResourceData::new(config.as_object().cloned().unwrap());
        PfwResource.delete(&ctx(&mock), &mut d).await.unwrap();
        assert_eq!(mock.calls_to(endpoints::COMPUTE_PFW_DEL).len(), 2);
    }

    #[tokio::test]
    async fn test_delete_on_missing_compute() {
        let mock = Arc::new(MockPlatform::new());
        mock.on_reply(endpoints::COMPUTE_PFW_LIST, MockReply::NotFound);

        let config = json!({"compute_id": 9001});
        let mut d = ResourceData::new(config.as_object().cloned().unwrap());
        PfwResource.delete(&ctx(&mock), &mut d).await.unwrap();
        assert!(mock.calls_to(endpoints::COMPUTE_PFW_DEL).is_empty());
    }
}
