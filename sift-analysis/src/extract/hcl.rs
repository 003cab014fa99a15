//! Terraform/HCL extractor.
//!
//! Parses HCL bodies into resource/variable/output rows and runs a small
//! built-in misconfiguration pass (public ACLs, open ingress, unencrypted
//! storage, wildcard IAM). Findings land in `terraform_findings` and are
//! mirrored into `findings_consolidated` by the indexer.

use hcl::{Block, Body, Expression};

use sift_core::errors::ExtractError;

use super::payload::*;
use crate::scanner::Language;

pub struct HclExtractor;

impl HclExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, file: &str, source: &str) -> Result<ExtractionPayload, ExtractError> {
        let body: Body = hcl::parse(source).map_err(|e| ExtractError::Parse {
            file: file.to_string(),
            message: e.to_string(),
        })?;

        let mut payload = ExtractionPayload::empty(file, Language::Hcl);
        for block in body.blocks() {
            match block.identifier() {
                "resource" => extract_resource(block, source, &mut payload),
                "variable" => extract_variable(block, source, &mut payload),
                "output" => extract_output(block, source, &mut payload),
                _ => {}
            }
        }
        Ok(payload)
    }
}

impl Default for HclExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn labels_of(block: &Block) -> Vec<String> {
    block
        .labels()
        .iter()
        .map(|l| l.as_str().to_string())
        .collect()
}

/// hcl-rs bodies carry no spans; recover the declaration line by locating
/// the labeled block header in the source text.
fn line_of(source: &str, needle: &str) -> i64 {
    match source.find(needle) {
        Some(offset) => source[..offset].matches('\n').count() as i64 + 1,
        None => 1,
    }
}

fn expr_json(expr: &Expression) -> String {
    serde_json::to_string(expr).unwrap_or_else(|_| "null".to_string())
}

fn attributes_json(body: &Body) -> String {
    let map: serde_json::Map<String, serde_json::Value> = body
        .attributes()
        .map(|attr| {
            let value =
                serde_json::to_value(attr.expr()).unwrap_or(serde_json::Value::Null);
            (attr.key().to_string(), value)
        })
        .collect();
    serde_json::Value::Object(map).to_string()
}

fn extract_resource(block: &Block, source: &str, payload: &mut ExtractionPayload) {
    let labels = labels_of(block);
    let (resource_type, resource_name) = match labels.as_slice() {
        [t, n, ..] => (t.clone(), n.clone()),
        _ => return,
    };
    let line = line_of(source, &format!("\"{resource_type}\" \"{resource_name}\""));

    payload
        .framework
        .terraform_resources
        .push(TerraformResourceRecord {
            line,
            resource_type: resource_type.clone(),
            resource_name: resource_name.clone(),
            attributes_json: attributes_json(block.body()),
        });

    check_misconfigurations(
        &resource_type,
        &resource_name,
        block.body(),
        line,
        payload,
    );
}

fn extract_variable(block: &Block, source: &str, payload: &mut ExtractionPayload) {
    let labels = labels_of(block);
    let Some(name) = labels.first() else {
        return;
    };
    let line = line_of(source, &format!("variable \"{name}\""));
    let default_json = block
        .body()
        .attributes()
        .find(|a| a.key() == "default")
        .map(|a| expr_json(a.expr()));
    payload
        .framework
        .terraform_variables
        .push(TerraformVariableRecord {
            line,
            name: name.clone(),
            default_json,
        });
}

fn extract_output(block: &Block, source: &str, payload: &mut ExtractionPayload) {
    let labels = labels_of(block);
    let Some(name) = labels.first() else {
        return;
    };
    let line = line_of(source, &format!("output \"{name}\""));
    let value_expr = block
        .body()
        .attributes()
        .find(|a| a.key() == "value")
        .map(|a| expr_json(a.expr()))
        .unwrap_or_default();
    payload
        .framework
        .terraform_outputs
        .push(TerraformOutputRecord {
            line,
            name: name.clone(),
            value_expr,
        });
}

// ─── Misconfiguration pass ──────────────────────────────────────────────

fn string_attr(body: &Body, key: &str) -> Option<String> {
    body.attributes().find(|a| a.key() == key).and_then(|a| {
        if let Expression::String(s) = a.expr() {
            Some(s.clone())
        } else {
            None
        }
    })
}

fn bool_attr(body: &Body, key: &str) -> Option<bool> {
    body.attributes().find(|a| a.key() == key).and_then(|a| {
        if let Expression::Bool(b) = a.expr() {
            Some(*b)
        } else {
            None
        }
    })
}

fn check_misconfigurations(
    resource_type: &str,
    resource_name: &str,
    body: &Body,
    line: i64,
    payload: &mut ExtractionPayload,
) {
    let resource = format!("{resource_type}.{resource_name}");
    let mut finding = |category: &str, severity: &str, message: String| {
        payload
            .framework
            .terraform_findings
            .push(TerraformFindingRecord {
                line,
                resource: resource.clone(),
                category: category.to_string(),
                severity: severity.to_string(),
                message,
            });
    };

    // Public object storage ACLs.
    if resource_type == "aws_s3_bucket" || resource_type == "aws_s3_bucket_acl" {
        if let Some(acl) = string_attr(body, "acl") {
            if acl.starts_with("public-read") {
                finding(
                    "public_exposure",
                    "high",
                    format!("bucket ACL '{acl}' grants public access"),
                );
            }
        }
    }

    // Databases reachable from the internet.
    if resource_type == "aws_db_instance" && bool_attr(body, "publicly_accessible") == Some(true) {
        finding(
            "public_exposure",
            "high",
            "database instance is publicly accessible".to_string(),
        );
    }

    // Unencrypted storage.
    if matches!(resource_type, "aws_ebs_volume" | "aws_db_instance")
        && matches!(
            (bool_attr(body, "encrypted"), bool_attr(body, "storage_encrypted")),
            (Some(false), _) | (_, Some(false))
        )
    {
        finding(
            "unencrypted_storage",
            "medium",
            "storage encryption is disabled".to_string(),
        );
    }

    // Security-group ingress open to the world.
    if resource_type == "aws_security_group" || resource_type == "aws_security_group_rule" {
        let open_world = body
            .blocks()
            .filter(|b| b.identifier() == "ingress")
            .any(|b| ingress_open(b.body()))
            || ingress_open(body);
        if open_world {
            finding(
                "open_ingress",
                "high",
                "ingress rule allows 0.0.0.0/0".to_string(),
            );
        }
    }

    // Wildcard IAM actions inside inline policy JSON.
    if resource_type == "aws_iam_policy" || resource_type == "aws_iam_role_policy" {
        if let Some(policy) = string_attr(body, "policy") {
            let compact: String = policy.chars().filter(|c| !c.is_whitespace()).collect();
            if compact.contains("\"Action\":\"*\"") || compact.contains("\"Resource\":\"*\"") {
                finding(
                    "wildcard_iam",
                    "high",
                    "IAM policy grants wildcard actions or resources".to_string(),
                );
            }
        }
    }
}

fn ingress_open(body: &Body) -> bool {
    body.attributes()
        .filter(|a| a.key() == "cidr_blocks")
        .any(|a| match a.expr() {
            Expression::Array(items) => items
                .iter()
                .any(|e| matches!(e, Expression::String(s) if s == "0.0.0.0/0")),
            Expression::String(s) => s == "0.0.0.0/0",
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_bucket_yields_resource_and_finding() {
        let source = "resource \"aws_s3_bucket\" \"assets\" {\n  acl = \"public-read\"\n}\n";
        let payload = HclExtractor::new().extract("/proj/main.tf", source).unwrap();

        assert_eq!(payload.framework.terraform_resources.len(), 1);
        let res = &payload.framework.terraform_resources[0];
        assert_eq!(res.resource_type, "aws_s3_bucket");
        assert_eq!(res.resource_name, "assets");
        assert_eq!(res.line, 1);

        let findings = &payload.framework.terraform_findings;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, "public_exposure");
        assert_eq!(findings[0].severity, "high");
        assert_eq!(findings[0].resource, "aws_s3_bucket.assets");
    }

    #[test]
    fn open_ingress_detected() {
        let source = r#"
resource "aws_security_group" "web" {
  ingress {
    from_port   = 22
    to_port     = 22
    cidr_blocks = ["0.0.0.0/0"]
  }
}
"#;
        let payload = HclExtractor::new().extract("/proj/sg.tf", source).unwrap();
        assert!(payload
            .framework
            .terraform_findings
            .iter()
            .any(|f| f.category == "open_ingress"));
    }

    #[test]
    fn variables_and_outputs_extracted() {
        let source = r#"
variable "region" {
  default = "us-east-1"
}

output "bucket_arn" {
  value = aws_s3_bucket.assets.arn
}
"#;
        let payload = HclExtractor::new().extract("/proj/io.tf", source).unwrap();
        assert_eq!(payload.framework.terraform_variables.len(), 1);
        assert_eq!(payload.framework.terraform_variables[0].name, "region");
        assert!(payload.framework.terraform_variables[0]
            .default_json
            .as_deref()
            .unwrap()
            .contains("us-east-1"));
        assert_eq!(payload.framework.terraform_outputs.len(), 1);
    }

    #[test]
    fn parse_failure_is_an_error() {
        let err = HclExtractor::new().extract("/proj/bad.tf", "resource {{{{").unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));
    }
}
