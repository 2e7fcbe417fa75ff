pub mod branch;
pub mod event;
pub mod message;
pub mod parcel;
pub mod user;
