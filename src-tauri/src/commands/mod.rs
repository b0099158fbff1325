pub mod receipts;
pub mod settings;
