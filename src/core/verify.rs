/// Dry-run checking of JSON documents
///
/// nft parses and evaluates the document against the kernel's current state
/// without committing anything (`nft --json --check`).
use serde_json::Value;
use tracing::{info, warn};

use crate::core::error::Result;
use crate::core::handle::{NftRunner, Nftables};

/// Result of a dry-run check
#[derive(Debug, Clone)]
pub struct VerifyResult {
    pub success: bool,
    pub errors: Vec<String>,
}

impl VerifyResult {
    pub fn success() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

/// Checks a document with `nft --json --check -f -`.
///
/// The handle's own output flags do not apply.
///
/// # Errors
///
/// Returns `Err` if the envelope is malformed or nft cannot be run; a document
/// nft rejects is an `Ok` failure result.
pub async fn check_document<R: NftRunner>(nft: &Nftables<R>, document: &Value) -> Result<VerifyResult> {
    nft.json_validate(document)?;
    let json_string = serde_json::to_string(document)?;

    info!("Checking document via nft --json --check");
    let output = nft
        .run_raw(&["--json", "--check", "-f", "-"], &json_string)
        .await?;

    if output.is_success() {
        info!("Document check passed");
        Ok(VerifyResult::success())
    } else {
        warn!("Document check failed: {}", output.error.trim());
        let mut errors = parse_nft_errors(&output.error);
        if errors.is_empty() {
            errors.push(format!("nft exited with status {}", output.rc));
        }
        Ok(VerifyResult::failure(errors))
    }
}

/// Parses nft error output into individual messages
///
/// JSON error objects first, then one message per non-empty line.
fn parse_nft_errors(stderr: &str) -> Vec<String> {
    if let Ok(json_err) = serde_json::from_str::<Value>(stderr)
        && let Some(errors) = json_err.get("errors").and_then(|e| e.as_array())
    {
        return errors
            .iter()
            .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
            .map(String::from)
            .collect();
    }

    stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.trim()
                .trim_start_matches("Error: ")
                .trim_start_matches("nft: ")
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::test_helpers::{ScriptedRunner, failed_output, ok_output};
    use serde_json::json;

    #[test]
    fn test_parse_nft_errors_plain_text() {
        let stderr = "Error: syntax error, unexpected $end\nError: invalid expression\n";
        let errors = parse_nft_errors(stderr);

        assert_eq!(errors, ["syntax error, unexpected $end", "invalid expression"]);
    }

    #[test]
    fn test_parse_nft_errors_json() {
        let stderr = r#"{"errors": [{"message": "Unknown expression type 'bogus'"}]}"#;
        assert_eq!(parse_nft_errors(stderr), ["Unknown expression type 'bogus'"]);
    }

    #[test]
    fn test_parse_nft_errors_empty() {
        assert!(parse_nft_errors("").is_empty());
    }

    #[tokio::test]
    async fn test_check_document_success() {
        let nft = Nftables::with_runner(ScriptedRunner::new(vec![ok_output("")]));
        let doc = json!({ "nftables": [{ "add": { "table": { "family": "inet", "name": "t" } } }] });

        let result = check_document(&nft, &doc).await.unwrap();
        assert!(result.success);
        assert_eq!(
            nft.runner().calls()[0].0,
            ["--json", "--check", "-f", "-"]
        );
    }

    #[tokio::test]
    async fn test_check_document_failure() {
        let nft = Nftables::with_runner(ScriptedRunner::new(vec![failed_output(
            1,
            "Error: Could not process rule: No such file or directory\n",
        )]));
        let doc = json!({ "nftables": [{ "add": { "chain": { "family": "inet", "table": "nope", "name": "c" } } }] });

        let result = check_document(&nft, &doc).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Could not process rule"));
    }

    #[tokio::test]
    async fn test_check_document_silent_failure() {
        let nft = Nftables::with_runner(ScriptedRunner::new(vec![failed_output(1, "")]));
        let doc = json!({ "nftables": [] });

        let result = check_document(&nft, &doc).await.unwrap();
        assert_eq!(result.errors, ["nft exited with status 1"]);
    }

    #[tokio::test]
    async fn test_check_document_rejects_bad_envelope_locally() {
        let nft = Nftables::with_runner(ScriptedRunner::new(vec![]));

        let err = check_document(&nft, &json!({ "rules": [] })).await.unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert!(nft.runner().calls().is_empty());
    }
}
