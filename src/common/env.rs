use std::env;
use std::error::Error;
use std::str::FromStr;

pub trait FromEnv: Sized {
    fn from_env(env_var: &str) -> anyhow::Result<Self>;

    /// Unset variables read as `None`; set but malformed ones are still an error
    fn from_env_opt(env_var: &str) -> anyhow::Result<Option<Self>> {
        match env::var_os(env_var) {
            Some(_) => Self::from_env(env_var).map(Some),
            None => Ok(None),
        }
    }
}

impl<T: FromStr> FromEnv for T
where
    <T as FromStr>::Err: 'static + Error + Send + Sync,
{
    fn from_env(env_var: &str) -> anyhow::Result<Self> {
        let value = env::var(env_var)?;
        Ok(T::from_str(&value)?)
    }
}
