#![deny(unsafe_code)]

use std::fmt;

use crate::ModelError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
                let value = value.into();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(ModelError::InvalidIdentifier {
                        kind: $kind,
                        value,
                    });
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ModelError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

string_id!(
    /// Identifier of a physical specimen.
    SpecimenId,
    "specimen id"
);
string_id!(
    /// Identifier of an aliquot (sub-specimen).
    AliquotId,
    "aliquot id"
);
string_id!(OrderId, "order id");
string_id!(PatientId, "patient id");
string_id!(
    /// Identifier of one OrderTest record. Retests get their own id.
    OrderTestId,
    "order test id"
);
string_id!(
    /// Catalog code of an orderable test (e.g. `CBC`).
    TestCode,
    "test code"
);
string_id!(
    /// Catalog code of a result parameter within a test (e.g. `HGB`).
    ParameterCode,
    "parameter code"
);

impl SpecimenId {
    /// Id of the successor drawn for `attempt` in the chain rooted at `root`.
    pub fn recollection(root: &SpecimenId, attempt: u32) -> Self {
        Self(format!("{root}-R{attempt}"))
    }
}

impl AliquotId {
    pub fn for_specimen(specimen: &SpecimenId, sequence: u32) -> Self {
        Self(format!("{specimen}-A{sequence}"))
    }
}

impl OrderTestId {
    /// Id of the record for `test` on `order`; retest numbers above zero get a suffix.
    pub fn for_order(order: &OrderId, test: &TestCode, retest_number: u32) -> Self {
        if retest_number == 0 {
            Self(format!("{order}:{test}"))
        } else {
            Self(format!("{order}:{test}:R{retest_number}"))
        }
    }
}
