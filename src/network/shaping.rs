//! Traffic shaping with `tc`.
//!
//! A shaped device gets a `netem` root qdisc carrying delay and loss, and
//! optionally a `tbf` child limiting the rate. Deleting the root removes the
//! child as well, so the child's stop command is a placeholder.

use crate::config::{Command, Configuration};
use crate::topology::LinkProperties;

/// Burst size of the token bucket.
const TBF_BURST: &str = "32kbit";

/// Maximum queueing latency of the token bucket.
const TBF_LATENCY: &str = "400ms";

/// Format a number without trailing zeros.
fn number(value: f64) -> String {
    let s = format!("{:.4}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn percent(fraction: f64) -> String {
    format!("{}%", number(fraction * 100.0))
}

/// Arguments of the `netem` qdisc for `props`.
pub fn netem_args(props: &LinkProperties) -> String {
    let mut args = Vec::new();
    if props.delay > 0.0 || props.delay_variation > 0.0 {
        args.push(format!("delay {}ms", number(props.delay)));
        if props.delay_variation > 0.0 {
            args.push(format!("{}ms", number(props.delay_variation)));
            if props.delay_correlation > 0.0 {
                args.push(percent(props.delay_correlation));
            }
        }
    }
    if props.loss > 0.0 {
        args.push(format!("loss {}", percent(props.loss)));
        if props.loss_correlation > 0.0 {
            args.push(percent(props.loss_correlation));
        }
    }
    args.join(" ")
}

/// Append shaping commands for `device`; nothing when the link is unshaped.
pub fn shape(config: &mut Configuration, device: &str, props: &LinkProperties) {
    if !props.is_shaped() {
        return;
    }
    let args = netem_args(props);
    let netem = if args.is_empty() {
        format!("tc qdisc add dev {} root handle 1: netem", device)
    } else {
        format!("tc qdisc add dev {} root handle 1: netem {}", device, args)
    };
    config.add_command(netem, format!("tc qdisc del dev {} root", device));

    if let Some(rate) = &props.rate {
        config.add_command(
            format!(
                "tc qdisc add dev {} parent 1: handle 2: tbf rate {} burst {} latency {}",
                device, rate, TBF_BURST, TBF_LATENCY
            ),
            Command::none(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(10.0), "10");
        assert_eq!(number(0.5), "0.5");
        assert_eq!(percent(0.07), "7%");
        assert_eq!(percent(0.001), "0.1%");
        assert_eq!(number(0.0), "0");
    }

    #[test]
    fn test_netem_arguments() {
        let props = LinkProperties::default()
            .with_delay(20.0)
            .with_delay_variation(5.0, 0.25)
            .with_loss(0.01, 0.5);
        assert_eq!(netem_args(&props), "delay 20ms 5ms 25% loss 1% 50%");

        let props = LinkProperties::default().with_loss(0.1, 0.0);
        assert_eq!(netem_args(&props), "loss 10%");
    }

    #[test]
    fn test_unshaped_link_adds_nothing() {
        let mut config = Configuration::new();
        shape(&mut config, "nv1", &LinkProperties::default());
        assert!(config.is_empty());
    }

    #[test]
    fn test_rate_adds_tbf_child() {
        let mut config = Configuration::new();
        shape(&mut config, "nx1", &LinkProperties::default().with_rate("10mbit"));
        assert_eq!(config.len(), 2);
        assert_eq!(config.start_cmds()[0].as_str(), "tc qdisc add dev nx1 root handle 1: netem");
        assert_eq!(config.stop_cmds()[0].as_str(), "tc qdisc del dev nx1 root");
        assert_eq!(
            config.start_cmds()[1].as_str(),
            "tc qdisc add dev nx1 parent 1: handle 2: tbf rate 10mbit burst 32kbit latency 400ms"
        );
        assert!(config.stop_cmds()[1].is_none());
    }
}
