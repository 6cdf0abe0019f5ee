//! Compound identifiers.
//!
//! Resources without a single remote name are identified locally by their
//! natural key parts joined with a fixed separator. Composition rejects
//! parts that would not survive a parse, so `parse(compose(parts)) == parts`
//! holds for every identifier this module produces.

use crate::error::{Error, Result};
use crate::kind::ResourceKind;

/// Layout of a compound identifier.
#[derive(Debug, Clone, Copy)]
pub struct IdFormat {
    kind: ResourceKind,
    separator: char,
    parts: &'static [&'static str],
    /// Parts allowed to be empty.
    optional: &'static [&'static str],
}

/// `cluster_identifier/schedule_identifier`
pub const SNAPSHOT_SCHEDULE_ASSOCIATION: IdFormat = IdFormat::new(
    ResourceKind::SnapshotScheduleAssociation,
    '/',
    &["cluster_identifier", "schedule_identifier"],
);

/// `account_id:cluster_identifier:database_name:partner_name`
pub const PARTNER: IdFormat = IdFormat::new(
    ResourceKind::Partner,
    ':',
    &[
        "account_id",
        "cluster_identifier",
        "database_name",
        "partner_name",
    ],
);

/// `account:cluster_identifier`
pub const ENDPOINT_AUTHORIZATION: IdFormat = IdFormat::new(
    ResourceKind::EndpointAuthorization,
    ':',
    &["account", "cluster_identifier"],
);

/// `data_share_arn,associate_entire_account,consumer_arn,consumer_region`.
/// Exactly one consumer part is in use, the others are left empty.
pub const DATA_SHARE_CONSUMER_ASSOCIATION: IdFormat = IdFormat::new(
    ResourceKind::DataShareConsumerAssociation,
    ',',
    &[
        "data_share_arn",
        "associate_entire_account",
        "consumer_arn",
        "consumer_region",
    ],
)
.optional(&["consumer_arn", "consumer_region"]);

/// `data_share_arn,consumer_identifier`. ARNs contain both `:` and `/`.
pub const DATA_SHARE_AUTHORIZATION: IdFormat = IdFormat::new(
    ResourceKind::DataShareAuthorization,
    ',',
    &["data_share_arn", "consumer_identifier"],
);

impl IdFormat {
    pub const fn new(kind: ResourceKind, separator: char, parts: &'static [&'static str]) -> Self {
        Self {
            kind,
            separator,
            parts,
            optional: &[],
        }
    }

    /// Allow `names` to be composed and parsed as empty parts.
    pub const fn optional(mut self, names: &'static [&'static str]) -> Self {
        self.optional = names;
        self
    }

    fn required(&self, name: &str) -> bool {
        !self.optional.iter().any(|o| *o == name)
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Join `parts` into an identifier.
    pub fn compose(&self, parts: &[&str]) -> Result<String> {
        let joined = parts.join(&self.separator.to_string());
        if parts.len() != self.parts.len() {
            return Err(self.malformed(
                &joined,
                format!("expected {} parts, got {}", self.parts.len(), parts.len()),
            ));
        }
        for (name, part) in self.parts.iter().zip(parts) {
            if part.is_empty() && self.required(name) {
                return Err(self.malformed(&joined, format!("{} is empty", name)));
            }
            if part.contains(self.separator) {
                return Err(self.malformed(
                    &joined,
                    format!("{} {:?} contains the separator {:?}", name, part, self.separator),
                ));
            }
        }
        Ok(joined)
    }

    /// Split an identifier back into its parts.
    pub fn parse(&self, id: &str) -> Result<Vec<String>> {
        let parts: Vec<&str> = id.split(self.separator).collect();
        if parts.len() != self.parts.len() {
            return Err(self.malformed(
                id,
                format!(
                    "expected {} separated by {:?}",
                    self.parts.join(&self.separator.to_string()),
                    self.separator
                ),
            ));
        }
        if let Some((name, _)) = self
            .parts
            .iter()
            .zip(&parts)
            .find(|(name, p)| p.is_empty() && self.required(name))
        {
            return Err(self.malformed(id, format!("{} is empty", name)));
        }
        Ok(parts.into_iter().map(str::to_string).collect())
    }

    fn malformed(&self, id: &str, reason: String) -> Error {
        Error::MalformedIdentifier {
            kind: self.kind,
            id: id.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_format() {
        let cases: [(IdFormat, &[&str]); 5] = [
            (SNAPSHOT_SCHEDULE_ASSOCIATION, &["analytics", "nightly"]),
            (ENDPOINT_AUTHORIZATION, &["210987654321", "analytics"]),
            (
                DATA_SHARE_CONSUMER_ASSOCIATION,
                &[
                    "arn:aws:redshift:us-west-2:123456789012:datashare:ns-1/sales",
                    "false",
                    "",
                    "eu-west-1",
                ],
            ),
            (PARTNER, &["123456789012", "analytics", "dev", "Datacoral"]),
            (
                DATA_SHARE_AUTHORIZATION,
                &[
                    "arn:aws:redshift:us-west-2:123456789012:datashare:ns-1/sales",
                    "arn:aws:redshift-serverless:us-west-2:210987654321:namespace/ns-2",
                ],
            ),
        ];
        for (format, parts) in cases {
            let id = format.compose(parts).unwrap();
            assert_eq!(format.parse(&id).unwrap(), parts);
        }
    }

    #[test]
    fn test_compose_rejects_empty_part() {
        let err = PARTNER
            .compose(&["123456789012", "", "dev", "Datacoral"])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }));
        assert!(err.to_string().contains("cluster_identifier is empty"));
    }

    #[test]
    fn test_compose_rejects_separator_in_part() {
        let err = SNAPSHOT_SCHEDULE_ASSOCIATION
            .compose(&["a/b", "nightly"])
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }));
    }

    #[test]
    fn test_parse_rejects_wrong_part_count() {
        for id in ["analytics", "a/b/c", ""] {
            let err = SNAPSHOT_SCHEDULE_ASSOCIATION.parse(id).unwrap_err();
            assert!(
                matches!(err, Error::MalformedIdentifier { .. }),
                "{id} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_rejects_empty_part() {
        let err = PARTNER.parse("123456789012::dev:Datacoral").unwrap_err();
        assert!(err.to_string().contains("cluster_identifier is empty"));
    }

    #[test]
    fn test_data_share_id_keeps_arn_intact() {
        let arn = "arn:aws:redshift:us-west-2:123456789012:datashare:ns-1/sales";
        let id = DATA_SHARE_AUTHORIZATION.compose(&[arn, "210987654321"]).unwrap();
        assert_eq!(id, format!("{},210987654321", arn));
        assert_eq!(DATA_SHARE_AUTHORIZATION.parse(&id).unwrap()[0], arn);
    }

    #[test]
    fn test_optional_parts_may_be_empty_but_required_ones_not() {
        let arn = "arn:aws:redshift:us-west-2:123456789012:datashare:ns-1/sales";
        let id = DATA_SHARE_CONSUMER_ASSOCIATION
            .compose(&[arn, "true", "", ""])
            .unwrap();
        assert_eq!(id, format!("{},true,,", arn));
        assert_eq!(
            DATA_SHARE_CONSUMER_ASSOCIATION.parse(&id).unwrap(),
            vec![arn, "true", "", ""]
        );

        let err = DATA_SHARE_CONSUMER_ASSOCIATION
            .parse(",true,,")
            .unwrap_err();
        assert!(err.to_string().contains("data_share_arn is empty"));
    }
}
