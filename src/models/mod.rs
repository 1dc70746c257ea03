pub mod activity;
pub mod email;
pub mod link;
pub mod participant;
pub mod trip;
