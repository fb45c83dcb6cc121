//! Generic request command implementation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use qcapi_runtime::ApiRequest;
use qcapi_runtime::client::Method;

use super::common::{Context, with_spinner};

/// Arguments of the request command.
#[derive(Debug)]
pub struct RequestArgs {
    pub method: String,
    pub path: String,
    pub no_auth: bool,
    pub no_crn: bool,
    pub no_api_version: bool,
    pub params: Vec<(String, String)>,
    pub json_file: Option<PathBuf>,
}

/// Parse a `key=value` query parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Build the API request described by the arguments.
pub fn build_request(args: RequestArgs) -> Result<ApiRequest> {
    let method = Method::from_bytes(args.method.trim().to_uppercase().as_bytes())
        .map_err(|_| anyhow::anyhow!("Invalid HTTP method: {}", args.method))?;

    let mut request = ApiRequest::new(method, &args.path);
    for (key, value) in args.params {
        request = request.query(key, Some(value));
    }
    if let Some(path) = &args.json_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let body = serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        request = request.json(body);
    }
    if args.no_auth {
        request = request.without_auth();
    }
    if args.no_crn {
        request = request.without_service_crn();
    }
    if args.no_api_version {
        request = request.without_api_version();
    }
    Ok(request)
}

/// Execute the request command.
pub async fn execute(ctx: &Context, args: RequestArgs) -> Result<()> {
    let request = build_request(args)?;
    let service = ctx.service()?;
    let message = format!("{} request...", request.method());
    let value = with_spinner(&message, service.request(request, &ctx.cancel)).await?;
    ctx.output.print_value(&value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(method: &str) -> RequestArgs {
        RequestArgs {
            method: method.to_string(),
            path: "/jobs".to_string(),
            no_auth: false,
            no_crn: false,
            no_api_version: false,
            params: Vec::new(),
            json_file: None,
        }
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("limit=5").unwrap(),
            ("limit".to_string(), "5".to_string())
        );
        assert_eq!(
            parse_param("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let request = build_request(args("post")).unwrap();
        assert_eq!(request.method(), Method::POST);
    }

    #[test]
    fn test_no_auth_flag() {
        let mut a = args("GET");
        a.no_auth = true;
        assert!(!build_request(a).unwrap().needs_auth());
    }

    #[test]
    fn test_json_file_body() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"program_id": "sampler"}}"#).unwrap();

        let mut a = args("POST");
        a.json_file = Some(file.path().to_path_buf());
        assert!(build_request(a).is_ok());
    }

    #[test]
    fn test_invalid_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let mut a = args("POST");
        a.json_file = Some(file.path().to_path_buf());
        let err = build_request(a).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_query_in_path_and_params() {
        let mut a = args("GET");
        a.path = "/jobs?limit=3".to_string();
        a.params = vec![("backend".to_string(), "ibm_fez".to_string())];
        let request = build_request(a).unwrap();
        let base = "https://example.com/api/v1".parse().unwrap();
        let url = qcapi_runtime::client::build_url(&base, &request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/api/v1/jobs?limit=3&backend=ibm_fez"
        );
    }

    #[test]
    fn test_missing_json_file() {
        let mut a = args("POST");
        a.json_file = Some(PathBuf::from("/nonexistent/body.json"));
        assert!(build_request(a).is_err());
    }
}
