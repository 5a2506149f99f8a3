//! Public command interface of an SSH service

use serde_json::Value;
use tracing::{debug, info};

use super::command::{interpret_rejection, Command, CommandTransport, Exchange, Request};
use super::error::SshError;
use crate::config::{AccountMap, Policy, Record, SERVICE_ACCOUNT};

pub struct SshService<T> {
    host: String,
    transport: T,
}

impl<T: CommandTransport> SshService<T> {
    pub fn new(host: impl Into<String>, transport: T) -> Self {
        Self {
            host: host.into(),
            transport,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Query command sent as the service account; the answer rides on the rejection
    async fn query(&self, command: Command) -> Result<Value, SshError> {
        let op = command.op();
        match self.transport.exchange(&Request::new(command), SERVICE_ACCOUNT).await? {
            Exchange::Accepted(_) => Err(SshError::UnexpectedSshReply(format!(
                "{} was accepted as a login for {}",
                op, SERVICE_ACCOUNT
            ))),
            Exchange::Rejected { reply } => interpret_rejection(&self.host, reply),
        }
    }

    fn member<R: Record>(reply: &Value, name: &str) -> Result<R, SshError> {
        let value = reply
            .get(name)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| SshError::UnexpectedSshReply(reply.to_string()))?;
        R::from_value(value).map_err(|e| {
            debug!("Invalid {} in reply: {}", name, e);
            SshError::UnexpectedSshReply(reply.to_string())
        })
    }

    pub async fn get_security_policy(&self) -> Result<Policy, SshError> {
        let reply = self.query(Command::GetSecurityPolicy).await?;
        let policy = Self::member(&reply, "policy")?;
        info!("Fetched security policy for {}", self.host);
        Ok(policy)
    }

    pub async fn get_account_map(&self, access_token: &str) -> Result<AccountMap, SshError> {
        let reply = self
            .query(Command::GetAccountMap {
                access_token: access_token.to_string(),
            })
            .await?;
        let map = Self::member(&reply, "account_map")?;
        info!("Fetched account map for {}", self.host);
        Ok(map)
    }

    /// Authenticate as `account`; on success the live connection is returned
    pub async fn login(&self, access_token: &str, account: &str) -> Result<T::Session, SshError> {
        let request = Request::new(Command::Login {
            access_token: access_token.to_string(),
        });
        match self.transport.exchange(&request, account).await? {
            Exchange::Accepted(session) => {
                info!("Logged in to {} as {}", self.host, account);
                Ok(session)
            }
            Exchange::Rejected { reply } => {
                interpret_rejection(&self.host, reply)?;
                Err(SshError::AuthorizationFailure)
            }
        }
    }
}
