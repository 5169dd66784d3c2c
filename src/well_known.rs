//! Well-known constants addressed by GUID.
//!
//! The bootstrap subset is resolved once per registry when the first session
//! opens; the rest are resolved on first use. Resolved references live in the
//! registry, not in process globals, so `Registry::reset` clears them too.

use std::fmt;

use crate::term::Guid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WellKnown {
    BaseKb,
    Isa,
    Genls,
    GenlMt,
    Comment,
    Collection,
    BinaryPredicate,
    ElementOf,
    And,
    Or,
    NumericallyEqual,
    PlusFn,
    Different,
    Thing,
    InferencePsc,
    EverythingPsc,
    CoExtensional,
    BackchainRequired,
    BackchainEncouraged,
    BackchainDiscouraged,
    BackchainForbidden,
    IrreflexiveBinaryPredicate,
}

impl WellKnown {
    /// Constants resolved when a session opens.
    pub const BOOTSTRAP: [WellKnown; 14] = [
        WellKnown::BaseKb,
        WellKnown::Isa,
        WellKnown::Genls,
        WellKnown::GenlMt,
        WellKnown::Comment,
        WellKnown::Collection,
        WellKnown::BinaryPredicate,
        WellKnown::ElementOf,
        WellKnown::And,
        WellKnown::Or,
        WellKnown::NumericallyEqual,
        WellKnown::PlusFn,
        WellKnown::Different,
        WellKnown::Thing,
    ];

    /// The constant's name in the reference knowledge base.
    pub fn name(self) -> &'static str {
        match self {
            WellKnown::BaseKb => "BaseKB",
            WellKnown::Isa => "isa",
            WellKnown::Genls => "genls",
            WellKnown::GenlMt => "genlMt",
            WellKnown::Comment => "comment",
            WellKnown::Collection => "Collection",
            WellKnown::BinaryPredicate => "BinaryPredicate",
            WellKnown::ElementOf => "elementOf",
            WellKnown::And => "and",
            WellKnown::Or => "or",
            WellKnown::NumericallyEqual => "numericallyEqual",
            WellKnown::PlusFn => "PlusFn",
            WellKnown::Different => "different",
            WellKnown::Thing => "Thing",
            WellKnown::InferencePsc => "InferencePSC",
            WellKnown::EverythingPsc => "EverythingPSC",
            WellKnown::CoExtensional => "coExtensional",
            WellKnown::BackchainRequired => "backchainRequired",
            WellKnown::BackchainEncouraged => "backchainEncouraged",
            WellKnown::BackchainDiscouraged => "backchainDiscouraged",
            WellKnown::BackchainForbidden => "backchainForbidden",
            WellKnown::IrreflexiveBinaryPredicate => "IrreflexiveBinaryPredicate",
        }
    }

    pub fn guid_str(self) -> &'static str {
        match self {
            WellKnown::BaseKb => "bd588111-9c29-11b1-9dad-c379636f7270",
            WellKnown::Isa => "bd588104-9c29-11b1-9dad-c379636f7270",
            WellKnown::Genls => "bd58810e-9c29-11b1-9dad-c379636f7270",
            WellKnown::GenlMt => "bd5880e5-9c29-11b1-9dad-c379636f7270",
            WellKnown::Comment => "bd588109-9c29-11b1-9dad-c379636f7270",
            WellKnown::Collection => "bd5880cc-9c29-11b1-9dad-c379636f7270",
            WellKnown::BinaryPredicate => "bd588102-9c29-11b1-9dad-c379636f7270",
            WellKnown::ElementOf => "c0659a2b-9c29-11b1-9dad-c379636f7270",
            WellKnown::And => "bd5880f9-9c29-11b1-9dad-c379636f7270",
            WellKnown::Or => "bd5880fa-9c29-11b1-9dad-c379636f7270",
            WellKnown::NumericallyEqual => "bd589d90-9c29-11b1-9dad-c379636f7270",
            WellKnown::PlusFn => "bd5880ae-9c29-11b1-9dad-c379636f7270",
            WellKnown::Different => "bd63f343-9c29-11b1-9dad-c379636f7270",
            WellKnown::Thing => "bd5880f4-9c29-11b1-9dad-c379636f7270",
            WellKnown::InferencePsc => "bd58915a-9c29-11b1-9dad-c379636f7270",
            WellKnown::EverythingPsc => "be7f041b-9c29-11b1-9dad-c379636f7270",
            WellKnown::CoExtensional => "bd59083a-9c29-11b1-9dad-c379636f7270",
            WellKnown::BackchainRequired => "beaa3d29-9c29-11b1-9dad-c379636f7270",
            WellKnown::BackchainEncouraged => "c09d1cea-9c29-11b1-9dad-c379636f7270",
            WellKnown::BackchainDiscouraged => "bfcbce14-9c29-11b1-9dad-c379636f7270",
            WellKnown::BackchainForbidden => "bfa4e9d2-9c29-11b1-9dad-c379636f7270",
            WellKnown::IrreflexiveBinaryPredicate => "bd654be7-9c29-11b1-9dad-c379636f7270",
        }
    }

    pub fn guid(self) -> Guid {
        Guid::parse(self.guid_str()).expect("well-known GUID table is well-formed")
    }

    /// Every well-known constant.
    pub fn all() -> impl Iterator<Item = WellKnown> {
        WellKnown::BOOTSTRAP.into_iter().chain([
            WellKnown::InferencePsc,
            WellKnown::EverythingPsc,
            WellKnown::CoExtensional,
            WellKnown::BackchainRequired,
            WellKnown::BackchainEncouraged,
            WellKnown::BackchainDiscouraged,
            WellKnown::BackchainForbidden,
            WellKnown::IrreflexiveBinaryPredicate,
        ])
    }
}

impl fmt::Display for WellKnown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#${}", self.name())
    }
}
