// Concrete implementations of the domain ports and the portal catalogue.
pub mod browser;
pub mod site;
