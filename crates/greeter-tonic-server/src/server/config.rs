use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use greeter_tonic_core::types::CallShape;
use std::net::SocketAddr;

pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:9090";
pub const DEFAULT_HEALTH_ADDR: &str = "0.0.0.0:8081";
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 16;
pub const DEFAULT_UNARY_DELAY_MS: u64 = 50;
pub const DEFAULT_SERVER_STREAM_DELAY_MS: u64 = 30;
pub const DEFAULT_CLIENT_STREAM_DELAY_MS: u64 = 20;
pub const DEFAULT_BIDI_DELAY_MS: u64 = 25;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for the `greeter-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults suitable for a demo
/// deployment behind a load balancer.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "greeter-tonic-server",
    version,
    about = "A gRPC greeter serving every call on its own task"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:9090" or "/tmp/greeter.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from(DEFAULT_SERVER_ADDR))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Address of the plain HTTP liveness endpoint (`GET /health`).
    ///
    /// Environment variable: `HEALTH_ADDR`
    #[arg(long, env = "HEALTH_ADDR", default_value_t = String::from(DEFAULT_HEALTH_ADDR))]
    pub health_addr: String,

    /// Capacity of the response channel between a call's task and its gRPC
    /// stream.
    ///
    /// Lower values push back on the call sooner when the client reads
    /// slowly; higher values let a call run further ahead of its client.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = DEFAULT_STREAM_BUFFER_SIZE)]
    pub stream_buffer_size: usize,

    /// Simulated work before answering `SayHello`, in milliseconds.
    ///
    /// Environment variable: `UNARY_DELAY_MS`
    #[arg(long, env = "UNARY_DELAY_MS", default_value_t = DEFAULT_UNARY_DELAY_MS)]
    pub unary_delay_ms: u64,

    /// Simulated work before each `SayHelloServerStream` response, in
    /// milliseconds.
    ///
    /// Environment variable: `SERVER_STREAM_DELAY_MS`
    #[arg(long, env = "SERVER_STREAM_DELAY_MS", default_value_t = DEFAULT_SERVER_STREAM_DELAY_MS)]
    pub server_stream_delay_ms: u64,

    /// Simulated work after each `SayHelloClientStream` message, in
    /// milliseconds.
    ///
    /// Environment variable: `CLIENT_STREAM_DELAY_MS`
    #[arg(long, env = "CLIENT_STREAM_DELAY_MS", default_value_t = DEFAULT_CLIENT_STREAM_DELAY_MS)]
    pub client_stream_delay_ms: u64,

    /// Simulated work before each `SayHelloBidirectional` response, in
    /// milliseconds.
    ///
    /// Environment variable: `BIDI_DELAY_MS`
    #[arg(long, env = "BIDI_DELAY_MS", default_value_t = DEFAULT_BIDI_DELAY_MS)]
    pub bidi_delay_ms: u64,

    /// Seconds to wait for in-flight calls to finish on shutdown before they
    /// are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout: u64,
}

/// Simulated work per call shape.
///
/// These are suspension points, not a timing contract: a call parks its own
/// task for the duration and observes cancellation while parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkDelays {
    pub unary: Duration,
    pub server_stream: Duration,
    pub client_stream: Duration,
    pub bidirectional: Duration,
}

impl WorkDelays {
    /// No simulated work at all.
    pub const NONE: Self = Self::uniform(Duration::ZERO);

    /// The same delay for every shape.
    pub const fn uniform(delay: Duration) -> Self {
        Self {
            unary: delay,
            server_stream: delay,
            client_stream: delay,
            bidirectional: delay,
        }
    }

    pub const fn for_shape(&self, shape: CallShape) -> Duration {
        match shape {
            CallShape::Unary => self.unary,
            CallShape::ServerStream => self.server_stream,
            CallShape::ClientStream => self.client_stream,
            CallShape::Bidirectional => self.bidirectional,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub health_addr: SocketAddr,
    pub stream_buffer_size: usize,
    pub delays: WorkDelays,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
            uds: false,
            health_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            delays: WorkDelays {
                unary: Duration::from_millis(DEFAULT_UNARY_DELAY_MS),
                server_stream: Duration::from_millis(DEFAULT_SERVER_STREAM_DELAY_MS),
                client_stream: Duration::from_millis(DEFAULT_CLIENT_STREAM_DELAY_MS),
                bidirectional: Duration::from_millis(DEFAULT_BIDI_DELAY_MS),
            },
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.server_addr.is_empty() {
            bail!("SERVER_ADDR must not be empty");
        }

        let health_addr = args
            .health_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid HEALTH_ADDR `{}`", args.health_addr))?;

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            health_addr,
            stream_buffer_size: args.stream_buffer_size,
            delays: WorkDelays {
                unary: Duration::from_millis(args.unary_delay_ms),
                server_stream: Duration::from_millis(args.server_stream_delay_ms),
                client_stream: Duration::from_millis(args.client_stream_delay_ms),
                bidirectional: Duration::from_millis(args.bidi_delay_ms),
            },
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parses with every flag given on the command line, so exported
    /// environment variables never leak into a test. `overrides` replaces
    /// the value of the named flags.
    fn parse(overrides: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let unary = DEFAULT_UNARY_DELAY_MS.to_string();
        let server_stream = DEFAULT_SERVER_STREAM_DELAY_MS.to_string();
        let client_stream = DEFAULT_CLIENT_STREAM_DELAY_MS.to_string();
        let bidi = DEFAULT_BIDI_DELAY_MS.to_string();
        let buffer = DEFAULT_STREAM_BUFFER_SIZE.to_string();
        let shutdown = DEFAULT_SHUTDOWN_TIMEOUT_SECS.to_string();
        let baseline = [
            ("--server-addr", DEFAULT_SERVER_ADDR),
            ("--health-addr", DEFAULT_HEALTH_ADDR),
            ("--stream-buffer-size", buffer.as_str()),
            ("--unary-delay-ms", unary.as_str()),
            ("--server-stream-delay-ms", server_stream.as_str()),
            ("--client-stream-delay-ms", client_stream.as_str()),
            ("--bidi-delay-ms", bidi.as_str()),
            ("--shutdown-timeout", shutdown.as_str()),
        ];

        let mut argv = vec!["greeter-tonic-server"];
        for (flag, default) in baseline {
            let value = overrides
                .iter()
                .find(|(name, _)| *name == flag)
                .map_or(default, |(_, value)| *value);
            argv.extend([flag, value]);
        }
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn baseline_matches_default_config() {
        let parsed = parse(&[]).unwrap();
        let default = ServerConfig::default();

        assert_eq!(parsed.server_addr, default.server_addr);
        assert!(!parsed.uds);
        assert_eq!(parsed.health_addr, default.health_addr);
        assert_eq!(parsed.stream_buffer_size, default.stream_buffer_size);
        assert_eq!(parsed.delays, default.delays);
        assert_eq!(parsed.shutdown_timeout, default.shutdown_timeout);
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let config = parse(&[
            ("--server-addr", "127.0.0.1:7000"),
            ("--health-addr", "127.0.0.1:7001"),
            ("--stream-buffer-size", "4"),
            ("--unary-delay-ms", "1"),
            ("--server-stream-delay-ms", "2"),
            ("--client-stream-delay-ms", "3"),
            ("--bidi-delay-ms", "4"),
            ("--shutdown-timeout", "5"),
        ])
        .unwrap();

        assert_eq!(config.server_addr, "127.0.0.1:7000");
        assert_eq!(config.health_addr, "127.0.0.1:7001".parse().unwrap());
        assert_eq!(config.stream_buffer_size, 4);
        assert_eq!(
            config.delays.for_shape(CallShape::ClientStream),
            Duration::from_millis(3)
        );
        assert_eq!(
            config.delays.for_shape(CallShape::Bidirectional),
            Duration::from_millis(4)
        );
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_stream_buffer() {
        let err = parse(&[("--stream-buffer-size", "0")]).unwrap_err();
        assert!(err.to_string().contains("STREAM_BUFFER_SIZE"));
    }

    #[test]
    fn rejects_malformed_health_addr() {
        let err = parse(&[("--health-addr", "not-an-addr")]).unwrap_err();
        assert!(err.to_string().contains("HEALTH_ADDR"));
    }

    #[test]
    fn uniform_delays_apply_to_every_shape() {
        let delays = WorkDelays::uniform(Duration::from_millis(7));
        for shape in CallShape::ALL {
            assert_eq!(delays.for_shape(shape), Duration::from_millis(7));
        }
        for shape in CallShape::ALL {
            assert_eq!(WorkDelays::NONE.for_shape(shape), Duration::ZERO);
        }
    }
}
