//! REST paths, relative to `http.base_url`.

pub const AUTH_REGISTER: &str = "/auth/register";
pub const AUTH_LOGIN: &str = "/auth/login";
pub const AUTH_VERIFY: &str = "/auth/verify";
pub const AUTH_REFRESH: &str = "/auth/refresh";
pub const AUTH_LOGOUT: &str = "/auth/logout";

pub const USERS_ME: &str = "/users/me";
pub const USERS_BY_PHONE: &str = "/users/phone";
pub const USERS_CONTACTS: &str = "/users/contacts";

pub const CONNECTIONS_REQUEST: &str = "/connections/request";
pub const CONNECTIONS_ACCEPT: &str = "/connections/accept";
pub const CONNECTIONS_REJECT: &str = "/connections/reject";
pub const CONNECTIONS_STATUS: &str = "/connections/status";
pub const CONNECTIONS_PARTNER: &str = "/connections/partner";

pub const MESSAGES: &str = "/messages";
pub const MESSAGES_TYPING: &str = "/messages/typing";

pub const PRESENCE: &str = "/presence";
pub const PRESENCE_PARTNER: &str = "/presence/partner";

pub const NOTIFICATIONS_DEVICES: &str = "/notifications/devices";
pub const NOTIFICATIONS_SETTINGS: &str = "/notifications/settings";

pub const LOVE_SPARKS: &str = "/lovesparks";
pub const LOVE_SPARKS_PERSONALIZED: &str = "/lovesparks/personalized";
