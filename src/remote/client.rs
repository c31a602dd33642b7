//! Shared HTTP plumbing for the remote backends
//!
//! Both backends speak JSON over HTTP against a service endpoint. The
//! endpoint is taken from the project configuration when set, otherwise
//! derived from the service identifier and region. Credentials come
//! from the environment: a bearer token, or an access/secret pair sent
//! as Basic auth.

use base64::Engine;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

use crate::config::Project;
use crate::error::{classify_network, classify_status, EnvyError, EnvyResult, ErrorKind};

/// Bearer-token env variable
pub const TOKEN_VAR: &str = "ENVY_TOKEN";
/// Basic-auth env variables
pub const ACCESS_KEY_VAR: &str = "ENVY_ACCESS_KEY";
pub const SECRET_KEY_VAR: &str = "ENVY_SECRET_KEY";

/// Request credentials resolved at construction
#[derive(Clone)]
pub enum Credentials {
	Bearer(String),
	Basic(String),
	Anonymous,
}

impl Credentials {
	/// Resolve from the process environment
	pub fn from_env() -> Self {
		if let Ok(token) = std::env::var(TOKEN_VAR) {
			if !token.is_empty() {
				return Credentials::Bearer(token);
			}
		}
		if let (Ok(access), Ok(secret)) =
			(std::env::var(ACCESS_KEY_VAR), std::env::var(SECRET_KEY_VAR))
		{
			let encoded =
				base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", access, secret));
			return Credentials::Basic(encoded);
		}
		Credentials::Anonymous
	}
}

impl std::fmt::Debug for Credentials {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		// Never render credential material
		match self {
			Credentials::Bearer(_) => f.write_str("Credentials::Bearer(...)"),
			Credentials::Basic(_) => f.write_str("Credentials::Basic(...)"),
			Credentials::Anonymous => f.write_str("Credentials::Anonymous"),
		}
	}
}

/// JSON-over-HTTP client for one service endpoint
#[derive(Debug, Clone)]
pub struct ServiceClient {
	http: reqwest::Client,
	base: Url,
	credentials: Credentials,
	profile: String,
}

impl ServiceClient {
	/// Build a client for the project's configured service
	pub fn for_project(project: &Project) -> EnvyResult<Self> {
		let endpoint = match &project.endpoint {
			Some(endpoint) => endpoint.clone(),
			None => derive_endpoint(&project.backend_service, &project.region),
		};
		let base = Url::parse(&endpoint).map_err(|e| {
			EnvyError::wrap(
				ErrorKind::ConfigInvalid,
				format!("Invalid service endpoint '{}'", endpoint),
				e,
			)
		})?;

		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.map_err(|e| EnvyError::wrap(ErrorKind::Internal, "Failed to build HTTP client", e))?;

		Ok(ServiceClient {
			http,
			base,
			credentials: Credentials::from_env(),
			profile: project.profile.clone(),
		})
	}

	/// Start a request against a path under the endpoint
	pub fn request(&self, method: Method, path: &str) -> EnvyResult<RequestBuilder> {
		let url = self.base.join(path.trim_start_matches('/')).map_err(|e| {
			EnvyError::wrap(ErrorKind::InvalidInput, format!("Invalid request path '{}'", path), e)
		})?;
		let mut builder = self.http.request(method, url).header("x-envy-profile", &self.profile);
		builder = match &self.credentials {
			Credentials::Bearer(token) => builder.bearer_auth(token),
			Credentials::Basic(encoded) => {
				builder.header(reqwest::header::AUTHORIZATION, format!("Basic {}", encoded))
			}
			Credentials::Anonymous => builder,
		};
		Ok(builder)
	}

	/// Send, mapping transport failures into the taxonomy
	pub async fn send(&self, builder: RequestBuilder) -> EnvyResult<Response> {
		builder.send().await.map_err(|e| {
			let kind = classify_network(&e);
			EnvyError::wrap(kind, "Remote request failed", e)
		})
	}
}

/// Derive the endpoint URL from a service identifier and region
///
/// A `backend_service` that is already a URL is used as-is, so local
/// and self-hosted deployments work without extra configuration.
pub fn derive_endpoint(service: &str, region: &str) -> String {
	if service.starts_with("http://") || service.starts_with("https://") {
		service.to_string()
	} else {
		format!("https://{}.{}.amazonaws.com", service_slug(service), region)
	}
}

fn service_slug(service: &str) -> &str {
	match service {
		"parameter-store" => "ssm",
		"secret-store" => "secretsmanager",
		other => other,
	}
}

/// Reject non-success responses, mapping the status into the taxonomy
///
/// `not_found_kind` and `exists_kind` let each backend surface its own
/// flavor of 404 and 409.
pub async fn check_status(
	response: Response,
	not_found_kind: ErrorKind,
	exists_kind: ErrorKind,
) -> EnvyResult<Response> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}

	let kind = match status {
		StatusCode::NOT_FOUND => not_found_kind,
		StatusCode::CONFLICT => exists_kind,
		other => classify_status(other.as_u16()),
	};
	let body = response.text().await.unwrap_or_default();
	let message = if body.is_empty() {
		format!("Remote service returned {}", status)
	} else {
		format!("Remote service returned {}: {}", status, body.chars().take(200).collect::<String>())
	};
	Err(EnvyError::new(kind, message).with_detail("status", status.as_u16().to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_derive_endpoint() {
		assert_eq!(
			derive_endpoint("parameter-store", "eu-west-1"),
			"https://ssm.eu-west-1.amazonaws.com"
		);
		assert_eq!(
			derive_endpoint("secret-store", "us-east-1"),
			"https://secretsmanager.us-east-1.amazonaws.com"
		);
		assert_eq!(
			derive_endpoint("http://localhost:9999", "ignored"),
			"http://localhost:9999"
		);
	}

	#[test]
	fn test_debug_hides_credentials() {
		let creds = Credentials::Bearer("sensitive".to_string());
		assert!(!format!("{:?}", creds).contains("sensitive"));
	}
}

// vim: ts=4
