//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Signup, login, logout and password reset tokens
//! - `email` - Reset link delivery over SMTP
//! - `uploads` - Multipart product forms and image storage
//! - `validation` - Form field rules shared by auth and admin

pub mod auth;
pub mod email;
pub mod uploads;
pub mod validation;
