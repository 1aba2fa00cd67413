//! Per-method handling of requests arriving at the host.

use serde::Deserialize;
use serde_json::Value;

use crate::config::ChainConfig;
use crate::host::pending::PromptKind;
use crate::host::responder::Responder;
use crate::host::runtime::WalletHost;
use crate::observability::metrics;
use crate::protocol::{Envelope, Method, Notification, PageMetadata, RequestId, RpcRequest};
use crate::rpc::{JsonRpcResponse, RpcError};
use crate::translator::{self, SessionParams, SigningEvent};

/// `wallet_addEthereumChain` params (EIP-3085 subset).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddChainParams {
    chain_id: String,
    chain_name: String,
    rpc_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchChainParams {
    chain_id: String,
}

fn parse_chain_id(raw: &str) -> Option<u64> {
    let hex = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    u64::from_str_radix(hex, 16).ok()
}

fn first_param<T: for<'de> Deserialize<'de>>(params: &[Value]) -> Result<T, String> {
    let first = params.first().ok_or_else(|| "missing params".to_string())?;
    serde_json::from_value(first.clone()).map_err(|e| e.to_string())
}

impl WalletHost {
    /// Handle one envelope from the port whose runtime-reported origin is
    /// `origin`.
    pub fn handle_envelope(&self, origin: &str, envelope: Envelope, responder: &Responder) {
        let Some(request) = envelope.request else {
            tracing::warn!(origin, "Envelope without request dropped");
            return;
        };

        if request.origin.as_deref() != Some(origin) {
            tracing::warn!(
                port_origin = origin,
                claimed_origin = ?request.origin,
                method = %request.method,
                "Envelope origin does not match port; dropped"
            );
            metrics::record_dropped("host_origin_mismatch");
            return;
        }

        // Control messages carry no id. An id-tagged reserved method is a page
        // request and goes through dispatch so it gets exactly one response.
        let Some(id) = envelope.id else {
            match request.method {
                Method::HealthCheck => self.record_health_check(origin),
                Method::GetConfig => {
                    responder.notify(Notification::config_changed(self.config_view()));
                }
                _ => {
                    tracing::debug!(origin, method = %request.method, "Request without id dropped");
                }
            }
            return;
        };

        if let Some(response) = self.dispatch(origin, id, request, responder) {
            responder.respond(response);
        }
    }

    /// Handle one session request. The permission subject is `session:<topic>`.
    pub fn handle_session(&self, id: RequestId, params: SessionParams, responder: &Responder) {
        let subject = format!("session:{}", params.topic);
        let event = SigningEvent::Session { id, params };
        if let Some(response) = self.park_signing(&subject, event, responder) {
            responder.respond(response);
        }
    }

    /// Returns the immediate response, or `None` when the request is parked.
    fn dispatch(
        &self,
        subject: &str,
        id: RequestId,
        request: RpcRequest,
        responder: &Responder,
    ) -> Option<JsonRpcResponse> {
        tracing::debug!(subject, id = %id, method = %request.method, "Dispatching request");

        match request.method.clone() {
            Method::Accounts => Some(JsonRpcResponse::success(
                id,
                self.connect_result(&Method::Accounts, subject),
            )),
            Method::ChainId => Some(JsonRpcResponse::success(
                id,
                Value::String(format!("0x{:x}", self.active_chain())),
            )),
            Method::SwitchChain => Some(self.switch_chain_request(subject, id, &request.params)),
            method @ (Method::RequestAccounts | Method::RequestPermissions) => {
                if self.permissions().is_connected(subject) {
                    return Some(JsonRpcResponse::success(
                        id,
                        self.connect_result(&method, subject),
                    ));
                }
                let metadata = PageMetadata::from_params(&request.params);
                self.park(responder, subject, id, PromptKind::Connect { method, metadata })
            }
            Method::AddChain => self.add_chain_request(subject, id, &request.params, responder),
            Method::Signer(_) => {
                self.park_signing(subject, SigningEvent::Page { id, request }, responder)
            }
            Method::GetConfig => Some(JsonRpcResponse::success(id, self.config_view())),
            Method::HealthCheck | Method::Unrecognized(_) => {
                Some(translator::fail(
                    id,
                    RpcError::method_not_supported()
                        .with_data(Value::String(request.method.as_str().to_string())),
                ))
            }
        }
    }

    /// Translate, check permission, then park for a decision. Nothing reaches
    /// the signer unless all three pass.
    fn park_signing(
        &self,
        subject: &str,
        event: SigningEvent,
        responder: &Responder,
    ) -> Option<JsonRpcResponse> {
        let id = event.id().clone();
        let request = match translator::translate(event) {
            Ok(request) => request,
            Err(e) => {
                tracing::info!(subject, id = %id, error = %e, "Request refused");
                return Some(translator::fail(id, e));
            }
        };

        let method = Method::Signer(request.method);
        if !self
            .permissions()
            .permits(subject, &method, request.account())
        {
            tracing::warn!(subject, id = %id, method = %method, "Origin not permitted");
            return Some(translator::fail(id, RpcError::unauthorized()));
        }

        self.park(responder, subject, id, PromptKind::Sign { request })
    }

    fn switch_chain_request(&self, subject: &str, id: RequestId, params: &[Value]) -> JsonRpcResponse {
        if !self.permissions().is_connected(subject) {
            return translator::fail(id, RpcError::unauthorized());
        }
        let params: SwitchChainParams = match first_param(params) {
            Ok(params) => params,
            Err(e) => return translator::invalid_params(id, e),
        };
        let Some(chain_id) = parse_chain_id(&params.chain_id) else {
            return translator::invalid_params(id, format!("invalid chainId '{}'", params.chain_id));
        };

        if self.switch_chain(chain_id) {
            JsonRpcResponse::success(id, Value::Null)
        } else {
            translator::fail(id, RpcError::chain_not_recognized())
        }
    }

    fn add_chain_request(
        &self,
        subject: &str,
        id: RequestId,
        params: &[Value],
        responder: &Responder,
    ) -> Option<JsonRpcResponse> {
        let parsed: AddChainParams = match first_param(params) {
            Ok(parsed) => parsed,
            Err(e) => return Some(translator::invalid_params(id, e)),
        };
        let Some(chain_id) = parse_chain_id(&parsed.chain_id) else {
            return Some(translator::invalid_params(
                id,
                format!("invalid chainId '{}'", parsed.chain_id),
            ));
        };
        let Some(rpc_url) = parsed
            .rpc_urls
            .into_iter()
            .find(|candidate| url::Url::parse(candidate).is_ok())
        else {
            return Some(translator::invalid_params(id, "rpcUrls has no valid URL"));
        };

        if self.wallet_config().chain(chain_id).is_some() {
            return Some(JsonRpcResponse::success(id, Value::Null));
        }

        let chain = ChainConfig {
            chain_id,
            name: parsed.chain_name,
            rpc_url,
        };
        let metadata = PageMetadata::from_params(params);
        self.park(responder, subject, id, PromptKind::AddChain { chain, metadata })
    }
}
