//! Configuration options for HTTP(S) clients.
use std::time::Duration;

use reqwest::Client;
use reqwest::ClientBuilder;

/// Options to initialise clients with.
pub struct ClientOptions {
    /// Address of the API server to connect to, with trailing slash.
    pub address: String,

    /// Timeout for requests made by the client.
    pub timeout: Duration,

    /// Timeout for new connections initialised by the client.
    pub timeout_connect: Duration,
}

impl ClientOptions {
    /// Start building a [`reqwest`] client with the timeouts set in these options.
    pub fn client(&self, user_agent: &str) -> ClientBuilder {
        Client::builder()
            .connect_timeout(self.timeout_connect)
            .timeout(self.timeout)
            .user_agent(user_agent)
    }

    /// Define options for API clients.
    pub fn url<S>(address: S) -> ClientOptionsBuilder
    where
        S: Into<String>,
    {
        ClientOptionsBuilder {
            address: address.into(),
            timeout: Duration::from_secs(30),
            timeout_connect: Duration::from_secs(1),
        }
    }
}

/// Incrementally build [`ClientOptions`] objects.
pub struct ClientOptionsBuilder {
    address: String,
    timeout: Duration,
    timeout_connect: Duration,
}

impl ClientOptionsBuilder {
    /// All options are set, get a usable options object.
    pub fn client(self) -> ClientOptions {
        self.into()
    }

    /// Set the timeout for requests made by the client.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the timeout for new connections initialised by the client.
    pub fn timeout_connect(mut self, timeout: Duration) -> Self {
        self.timeout_connect = timeout;
        self
    }
}

impl From<ClientOptionsBuilder> for ClientOptions {
    fn from(value: ClientOptionsBuilder) -> Self {
        let mut address = value.address;
        if !address.ends_with('/') {
            address.push('/');
        }
        ClientOptions {
            address,
            timeout: value.timeout,
            timeout_connect: value.timeout_connect,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::ClientOptions;

    #[test]
    fn address_gets_trailing_slash() {
        let options = ClientOptions::url("https://project.example.com").client();
        assert_eq!(options.address, "https://project.example.com/");
        assert_eq!(options.timeout, Duration::from_secs(30));

        let options = ClientOptions::url("https://project.example.com/")
            .timeout(Duration::from_secs(5))
            .client();
        assert_eq!(options.address, "https://project.example.com/");
        assert_eq!(options.timeout, Duration::from_secs(5));
    }
}
