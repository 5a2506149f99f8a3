//! Target host discovery in ssh/scp argument lists
//!
//! Options are walked getopt-style: flags may be bundled (`-tt`), and an option
//! that takes a value consumes either the rest of its own argument (`-p22`) or
//! the next one (`-p 22`).

/// ssh options taking a value (OpenSSH)
const SSH_VALUE_OPTIONS: &str = "BbcDEeFIiJLlmOoPpQRSWw";
/// scp options taking a value (OpenSSH)
const SCP_VALUE_OPTIONS: &str = "cDFiJloPSX";

/// Positional arguments left after skipping options
fn operands<'a>(args: &'a [String], value_options: &str) -> Vec<&'a str> {
    let mut operands = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--" {
            operands.extend(iter.map(String::as_str));
            break;
        }
        let Some(flags) = arg.strip_prefix('-').filter(|f| !f.is_empty()) else {
            operands.push(arg.as_str());
            continue;
        };
        for (i, flag) in flags.char_indices() {
            if value_options.contains(flag) {
                if i + flag.len_utf8() == flags.len() {
                    iter.next();
                }
                break;
            }
        }
    }
    operands
}

/// Host of `ssh [options] [user@]host [command...]`
pub fn ssh_host(args: &[String]) -> Option<String> {
    let destination = *operands(args, SSH_VALUE_OPTIONS).first()?;
    let host = destination.rsplit('@').next()?;
    let host = host
        .strip_prefix("ssh://")
        .map(|rest| rest.split(':').next().unwrap_or(rest))
        .unwrap_or(host);
    (!host.is_empty()).then(|| host.to_string())
}

/// Host of the first remote operand of `scp [options] source... target`
pub fn scp_host(args: &[String]) -> Option<String> {
    operands(args, SCP_VALUE_OPTIONS).into_iter().find_map(|operand| {
        let remote = operand.rsplit('@').next()?;
        let (host, _path) = remote.split_once(':')?;
        (!host.is_empty() && !host.contains('/')).then(|| host.to_string())
    })
}
