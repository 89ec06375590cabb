mod credentials;
mod token;

pub use credentials::{
    check_password_length, hash_password, AuthResponse, SignInRequest, SignUpRequest,
    MIN_PASSWORD_LENGTH,
};
pub use token::{
    issue_token, token_cookie, verify_token, Admin, AuthToken, Clearance, GuardRejection, Staff,
    Voter, AUTH_TOKEN_COOKIE,
};
