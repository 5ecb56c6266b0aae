pub mod material;
pub mod purchase;
pub mod status;
