pub mod application;
pub mod backend;
pub mod chat;
pub mod identity;
pub mod message;
pub mod milestone;
pub mod notice;
pub mod page;
pub mod permissions;
pub mod project;
pub mod realtime;
pub mod session;
pub mod subscription;

mod nullable;
