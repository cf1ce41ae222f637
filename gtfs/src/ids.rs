use serde::{Deserialize, Serialize};

// All of these are the original string IDs from the feed. A build only lives as long as one
// date, so there's no need for cheaper numeric IDs.

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(StopID);
string_id!(TripID);
string_id!(RouteID);
string_id!(ServiceID);
string_id!(ShapeID);
