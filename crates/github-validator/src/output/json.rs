//! JSON output: every report is dumped as-is, pretty-printed.

use std::io;

use serde::Serialize;

pub(crate) fn output(mut sink: impl io::Write, report: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut sink, report)?;
    writeln!(sink)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::output;
    use crate::probe::{PermissionResult, Scope, ValidationReport, ValidationSummary};

    #[test]
    fn test_report_keys_keep_their_order() {
        let mut critical = IndexMap::new();
        for scope in [Scope::Repo, Scope::AdminOrg] {
            critical.insert(
                scope.ident(),
                PermissionResult {
                    permission: scope.ident(),
                    granted: false,
                    message: "Cannot access repositories".into(),
                    details: IndexMap::new(),
                    confidence: scope.confidence(),
                    errored: false,
                },
            );
        }

        let report = ValidationReport {
            critical_permissions: critical,
            standard_permissions: IndexMap::new(),
            summary: ValidationSummary::default(),
            authenticated_user: None,
            rate_limit: None,
            creation_test: None,
        };

        let mut buf = vec![];
        output(&mut buf, &report).unwrap();
        let rendered = String::from_utf8(buf).unwrap();

        let repo = rendered.find("\"repo\"").unwrap();
        let admin_org = rendered.find("\"admin:org\"").unwrap();
        assert!(repo < admin_org);
        assert!(rendered.contains("\"confidence\": \"proxy\""));
        assert!(!rendered.contains("authenticated_user"));
        assert!(rendered.ends_with("}\n"));
    }
}
