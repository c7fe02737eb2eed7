pub mod gene_model;
pub mod time;
