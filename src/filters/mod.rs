pub mod altitude;
