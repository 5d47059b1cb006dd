//! REST-backed collaborator implementations for the CLI.
//!
//! Thin JSON passthroughs: no resource-model parsing happens here beyond
//! lifting payloads into [`ResourceRecord`]s. Both clients negotiate JSON via
//! the `Accept` header.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::clients::{
    ComponentConfigAdmin, FlowRuleAdmin, InterfaceMetadata, NodeAdmin, OrchestratorClient,
    PortAnnotation, SwitchAdminClient, SwitchPortInspector,
};
use crate::node::{ManagedNode, NodeState, NodeType};
use crate::resource::{ResourceKind, ResourceRecord};

fn json_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .context("building HTTP client")
}

/// Orchestrator REST client: lists resource collections.
pub struct HttpOrchestrator {
    base: String,
    http: reqwest::Client,
}

impl HttpOrchestrator {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            http: json_client()?,
        })
    }
}

#[async_trait]
impl OrchestratorClient for HttpOrchestrator {
    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<ResourceRecord>> {
        let collection = kind.collection();
        let url = format!("{}/{}", self.base, collection);
        let body: Value = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .json()
            .await
            .with_context(|| format!("decoding {collection}"))?;

        // Collections come wrapped under their name: {"ports": [...]}.
        let Some(items) = body.get(collection).and_then(Value::as_array) else {
            bail!("response from {url} has no '{collection}' array");
        };

        Ok(items
            .iter()
            .cloned()
            .map(|payload| {
                // Payloads without a usable ID are passed through with an
                // empty identity so the reconciler reports them per item.
                ResourceRecord::from_payload(kind, payload.clone())
                    .unwrap_or_else(|| ResourceRecord::new(kind, "", payload))
            })
            .collect())
    }
}

/// Controller admin REST client covering flow rules, nodes, switch ports and
/// component configuration.
pub struct HttpControllerAdmin {
    base: String,
    http: reqwest::Client,
}

impl HttpControllerAdmin {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            http: json_client()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

#[async_trait]
impl FlowRuleAdmin for HttpControllerAdmin {
    async fn is_registered(&self, app_id: &str) -> Result<bool> {
        let url = self.url(&format!("/applications/{app_id}"));
        let resp = self.http.get(&url).send().await.with_context(|| format!("GET {url}"))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => bail!("GET {url} returned {status}"),
        }
    }

    async fn remove_rules_by_app(&self, app_id: &str) -> Result<()> {
        let url = self.url(&format!("/flows/application/{app_id}"));
        self.http
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("DELETE {url}"))?
            .error_for_status()
            .with_context(|| format!("DELETE {url}"))?;
        Ok(())
    }

    async fn count_rules_by_app(&self, app_id: &str) -> Result<u64> {
        let url = self.url(&format!("/flows/application/{app_id}/count"));
        let body: Value = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("decoding rule count")?;
        body.get("count")
            .and_then(Value::as_u64)
            .with_context(|| format!("response from {url} has no numeric 'count'"))
    }
}

#[async_trait]
impl NodeAdmin for HttpControllerAdmin {
    async fn list_nodes(&self, node_type: Option<NodeType>) -> Result<Vec<ManagedNode>> {
        let url = self.url("/nodes");
        let nodes: Vec<ManagedNode> = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("decoding node list")?;

        Ok(match node_type {
            Some(wanted) => nodes.into_iter().filter(|n| n.node_type == wanted).collect(),
            None => nodes,
        })
    }

    async fn get_node(&self, hostname: &str) -> Result<Option<ManagedNode>> {
        let url = self.url(&format!("/nodes/{hostname}"));
        let resp = self.http.get(&url).send().await.with_context(|| format!("GET {url}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let node = resp
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .json()
            .await
            .context("decoding node")?;
        Ok(Some(node))
    }

    async fn update_node_state(&self, hostname: &str, state: NodeState) -> Result<()> {
        let url = self.url(&format!("/nodes/{hostname}/state"));
        self.http
            .put(&url)
            .json(&json!({ "state": state }))
            .send()
            .await
            .with_context(|| format!("PUT {url}"))?
            .error_for_status()
            .with_context(|| format!("PUT {url}"))?;
        Ok(())
    }
}

#[async_trait]
impl SwitchPortInspector for HttpControllerAdmin {
    async fn list_ports(&self, node: &ManagedNode) -> Result<Vec<PortAnnotation>> {
        let url = self.url(&format!(
            "/nodes/{}/bridges/{}/ports",
            node.hostname, node.integration_bridge
        ));
        self.http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .json()
            .await
            .context("decoding port annotations")
    }
}

#[async_trait]
impl SwitchAdminClient for HttpControllerAdmin {
    async fn create_interface(
        &self,
        node: &ManagedNode,
        name: &str,
        metadata: &InterfaceMetadata,
    ) -> Result<()> {
        let url = self.url(&format!(
            "/nodes/{}/bridges/{}/interfaces",
            node.hostname, node.integration_bridge
        ));
        self.http
            .post(&url)
            .json(&json!({ "name": name, "metadata": metadata }))
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("POST {url}"))?;
        Ok(())
    }
}

#[async_trait]
impl ComponentConfigAdmin for HttpControllerAdmin {
    async fn set_property(&self, component: &str, key: &str, value: &str) -> Result<()> {
        let url = self.url(&format!("/configuration/{component}/{key}"));
        self.http
            .post(&url)
            .json(&json!({ "value": value }))
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("POST {url}"))?;
        Ok(())
    }

    async fn get_property(&self, component: &str, key: &str) -> Result<Option<String>> {
        let url = self.url(&format!("/configuration/{component}/{key}"));
        let resp = self.http.get(&url).send().await.with_context(|| format!("GET {url}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = resp
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .json()
            .await
            .context("decoding property")?;
        Ok(body
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}
