pub mod domain;
pub mod filters;
pub mod page;

pub use domain::{
    Checksum, Collection, Fileset, IntellectualObject, LinkedPremisEvent, LinkingAgent,
    ObjectFile, PremisEvent, SOURCE_FILE_FUNCTION,
};
pub use filters::ObjectFilters;
pub use page::Page;
