//! Positional lookup of identifiers assigned by the control plane
//!
//! The control-plane CLI picks some resource names itself (instance groups) or
//! allocates values on our behalf (external addresses). Those are read back by
//! absolute token position in the flattened table. [`TableShape`] pins down the
//! layout each position is valid for, so a changed layout is rejected instead of
//! yielding the wrong token.

use crate::error::{ProvisionError, Result};
use crate::tabular::{self, Table};

/// Token at `index`, counting across the whole blob
pub fn resolve<S: AsRef<str>>(tokens: &[S], index: usize) -> Result<&str> {
    tokens
        .get(index)
        .map(AsRef::as_ref)
        .ok_or(ProvisionError::IndexOutOfRange {
            index,
            len: tokens.len(),
        })
}

/// Expected layout of a table and the position of the wanted token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableShape {
    pub name: &'static str,
    pub header: &'static [&'static str],
    /// Tokens per data row after blank columns collapse
    pub row_width: usize,
    pub index: usize,
}

/// `gcloud compute instance-groups list`
pub const INSTANCE_GROUP: TableShape = TableShape {
    name: "instance group",
    header: &["NAME", "LOCATION", "SCOPE", "NETWORK", "MANAGED", "INSTANCES"],
    row_width: 6,
    index: 6,
};

/// `gcloud compute addresses list` for a global address (REGION is blank)
pub const EXTERNAL_ADDRESS: TableShape = TableShape {
    name: "external address",
    header: &["NAME", "REGION", "ADDRESS", "STATUS"],
    row_width: 3,
    index: 5,
};

impl TableShape {
    /// Smallest token count for which `index` is addressable
    fn min_tokens(&self) -> usize {
        self.index + 1
    }

    pub fn check(&self, table: &Table) -> Result<()> {
        let header = table.header();
        if header.len() != self.header.len()
            || header.iter().zip(self.header).any(|(got, want)| got != want)
        {
            return Err(self.unexpected(format!(
                "header is `{}`, expected `{}`",
                header.join(" "),
                self.header.join(" ")
            )));
        }

        let rows = table.data_rows();
        if rows.len() != 1 {
            return Err(self.unexpected(format!("expected 1 data row, found {}", rows.len())));
        }

        if rows[0].len() != self.row_width {
            return Err(self.unexpected(format!(
                "expected {} columns, found {}: `{}`",
                self.row_width,
                rows[0].len(),
                rows[0].join(" ")
            )));
        }

        if table.token_count() < self.min_tokens() {
            return Err(self.unexpected(format!(
                "{} tokens, position {} needs at least {}",
                table.token_count(),
                self.index,
                self.min_tokens()
            )));
        }

        Ok(())
    }

    /// Check the layout, then pick the token at this shape's position
    pub fn resolve(&self, table: &Table) -> Result<String> {
        self.check(table)?;
        let tokens = table.tokens();
        resolve(tokens.as_slice(), self.index).map(str::to_string)
    }

    /// Parse raw CLI output and resolve it in one go
    pub fn resolve_output(&self, raw: &str) -> Result<String> {
        let table = tabular::parse(raw)?;
        self.resolve(&table)
    }

    fn unexpected(&self, reason: String) -> ProvisionError {
        ProvisionError::UnexpectedTable {
            table: self.name,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_resolve_instance_group_token() {
        let tokens = tokens(
            "NAME LOCATION SCOPE NETWORK MANAGED INSTANCES foo-clus-default-pool-bar-grp us-central1-a zone default Yes 2",
        );
        assert_eq!(resolve(tokens.as_slice(), 6).unwrap(), "foo-clus-default-pool-bar-grp");
    }

    #[test]
    fn test_resolve_external_ip_token() {
        let tokens =
            tokens("NAME REGION ADDRESS STATUS load-balancer-external-ip 35.201.127.254 IN_USE");
        assert_eq!(resolve(tokens.as_slice(), 5).unwrap(), "35.201.127.254");
    }

    #[test]
    fn test_resolve_bounds() {
        let samples: Vec<Vec<String>> = vec![
            Vec::new(),
            tokens("a"),
            tokens("a b c"),
            tokens("NAME REGION ADDRESS STATUS x 1.2.3.4 IN_USE"),
        ];

        for tokens in &samples {
            let len = tokens.len();
            for index in 0..len {
                assert_eq!(resolve(tokens.as_slice(), index).unwrap(), tokens[index]);
            }
            for index in [len, len + 1, len + 10] {
                let err = resolve(tokens.as_slice(), index).unwrap_err();
                assert!(matches!(
                    err,
                    ProvisionError::IndexOutOfRange { index: i, len: l } if i == index && l == len
                ));
            }
        }
    }

    #[test]
    fn test_instance_group_shape() {
        let raw = "NAME                           LOCATION       SCOPE  NETWORK  MANAGED  INSTANCES\n\
                   foo-clus-default-pool-bar-grp  us-central1-a  zone   default  Yes      2\n";
        assert_eq!(
            INSTANCE_GROUP.resolve_output(raw).unwrap(),
            "foo-clus-default-pool-bar-grp"
        );
    }

    #[test]
    fn test_external_address_shape() {
        let raw = "NAME                       REGION  ADDRESS         STATUS\n\
                   load-balancer-external-ip          35.201.127.254  IN_USE\n";
        assert_eq!(EXTERNAL_ADDRESS.resolve_output(raw).unwrap(), "35.201.127.254");
    }

    #[test]
    fn test_non_blank_region_is_rejected() {
        let raw = "NAME                       REGION       ADDRESS         STATUS\n\
                   load-balancer-external-ip  us-central1  35.201.127.254  IN_USE\n";
        let err = EXTERNAL_ADDRESS.resolve_output(raw).unwrap_err();
        assert!(matches!(err, ProvisionError::UnexpectedTable { .. }));
    }

    #[test]
    fn test_changed_header_is_rejected() {
        let raw = "NAME  ADDRESS/RANGE   TYPE      STATUS\n\
                   lb-ip 35.201.127.254  EXTERNAL  IN_USE\n";
        let err = EXTERNAL_ADDRESS.resolve_output(raw).unwrap_err();
        assert!(err.to_string().contains("header is"));
    }

    #[test]
    fn test_header_only_is_rejected() {
        let raw = "NAME LOCATION SCOPE NETWORK MANAGED INSTANCES\n";
        let err = INSTANCE_GROUP.resolve_output(raw).unwrap_err();
        assert!(err.to_string().contains("found 0"));
    }

    #[test]
    fn test_multiple_rows_are_rejected() {
        let raw = "NAME LOCATION SCOPE NETWORK MANAGED INSTANCES\n\
                   a-grp us-central1-a zone default Yes 2\n\
                   b-grp us-central1-b zone default Yes 2\n";
        let err = INSTANCE_GROUP.resolve_output(raw).unwrap_err();
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_empty_output_is_rejected() {
        assert!(matches!(
            INSTANCE_GROUP.resolve_output(""),
            Err(ProvisionError::EmptyOutput)
        ));
    }

    #[test]
    fn test_min_tokens() {
        assert_eq!(INSTANCE_GROUP.min_tokens(), 7);
        assert_eq!(EXTERNAL_ADDRESS.min_tokens(), 6);
    }

    #[test]
    fn test_position_beyond_shape_is_rejected() {
        let shape = TableShape {
            name: "narrow",
            header: &["NAME", "STATUS"],
            row_width: 2,
            index: 4,
        };
        let err = shape.resolve_output("NAME STATUS
foo READY
").unwrap_err();
        assert!(matches!(err, ProvisionError::UnexpectedTable { table: "narrow", .. }));
    }
}
