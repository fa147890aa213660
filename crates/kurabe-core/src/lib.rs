//! Core types and diff engines for disclosure-document comparison.

pub mod comparison;
pub mod document;
pub mod mode;
pub mod numeric;
pub mod textdiff;

pub use comparison::{
    AdditionalSearchResult, ComparisonResult, FoundSection, Importance, MappingMethod,
    SecondaryAnalysis, SectionDetailedComparison, SectionMapping, TextChanges, ToneAnalysis,
};
pub use document::{DocumentDescriptor, ExtractedContent, SectionInfo, StructuredDocument};
pub use mode::{ComparisonMode, ModeError, classify_mode, normalize_company_name};
pub use numeric::NumericalDifference;
pub use textdiff::TextDifference;
