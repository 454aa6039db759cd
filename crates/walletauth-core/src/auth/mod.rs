/*
[INPUT]:  Wallet signers, login options, login payloads and session tokens
[OUTPUT]: Verified addresses and session credentials
[POS]:    Auth layer - login and session token protocols
[UPDATE]: When adding protocol operations or changing validation order
*/

pub mod login;
pub mod registry;
pub mod token;
pub mod validator;

pub use login::{
    LoginOptions, VerifyOptions, build, create_login_message, login, parse_login_message, sign,
    verify,
};
pub use registry::{AuthRegistry, WalletAuth};
pub use token::{
    AuthenticateOptions, AuthenticatedToken, GenerateOptions, ParsedToken, SessionFn,
    authenticate, authenticate_and_refresh, generate_token, issue, parse, refresh,
};
pub use validator::{BoxError, FnValidator, UsedNonces, Validator};
