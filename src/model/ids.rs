//! Typed indices into the mission database

use serde::Serialize;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

define_id!(
    /// Index of a parameter type; parameters sharing an id share the type
    ParameterTypeId
);
define_id!(ParameterId);
define_id!(ContainerId);
define_id!(ArgumentTypeId);
define_id!(CommandId);
define_id!(AlgorithmId);
