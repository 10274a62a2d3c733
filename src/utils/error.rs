use std::error::Error;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GTErrCode {
    NotValidObject,
    SessionBusy,
    FormatFailed,
    GarbageFound,
}

#[derive(Debug)]
pub struct GTError {
    msg: String,
    code: GTErrCode,
}

impl GTError {
    pub fn new<S>(msg: S, code: GTErrCode) -> Self
    where
        S: ToString,
    {
        Self {
            msg: msg.to_string(),
            code,
        }
    }

    pub fn code(&self) -> GTErrCode {
        self.code
    }

    pub fn message(&self) -> &str {
        self.msg.as_str()
    }
}

impl Display for GTError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.msg)
    }
}

impl Error for GTError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
