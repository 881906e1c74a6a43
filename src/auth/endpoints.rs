//! Auth endpoint paths, relative to the API base URL

pub const LOGIN: &str = "/api/users/login";
pub const REGISTER: &str = "/api/users/register";
pub const FORGOT_PASSWORD: &str = "/api/users/forgot-password";
pub const RESET_PASSWORD: &str = "/api/users/reset-password";
pub const REFRESH_TOKEN: &str = "/api/users/refresh-token";
pub const PROFILE: &str = "/api/users/profile";
