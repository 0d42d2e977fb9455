/// Router Module Index
///
/// Groups the console's routes by the access tier the request gate enforces for them.
/// The grouping is for readers: access control itself is decided by the gate from the
/// route table in `AppConfig`, not by which router a route sits in.

/// Pages and flows anyone may reach: landing, SEO artifacts, sign-in and recovery.
pub mod public;

/// Pages that need a signed-in operator.
pub mod authenticated;

/// Admin-only CRUD screens (super-admin role required).
pub mod admin;
