pub mod decompose;
pub mod lookup;
