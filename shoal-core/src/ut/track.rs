// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use colored::*;
use kdam::{Bar, tqdm};

/// Progress bar over `n` items, hidden unless `verbose`
pub fn progress_bar(n: usize, desc: &str, verbose: bool) -> Bar {
    if !verbose {
        return tqdm!(disable = true);
    }

    tqdm!(
        total = n,
        force_refresh = false,
        desc = progress_timestamp(desc),
        bar_format =
            "{desc suffix=' '}[{percentage:.0}%] ({rate:.1}/s, eta: {remaining human=true})"
    )
}

/// A progress description with a standardized timestamp
pub fn progress_timestamp(desc: &str) -> String {
    let time = chrono::Local::now().format("%Y-%m-%d | %H:%M:%S");

    format!(
        "{} {} {} {} {} {}",
        "[".bold(),
        time,
        "|".bold(),
        "shoal".truecolor(46, 139, 192).bold(),
        "]".bold(),
        desc,
    )
}

/// Print timestamped statements to console
pub fn progress_log(desc: &str, verbose: bool) {
    if !verbose {
        return;
    }

    println!("{}", progress_timestamp(desc));
}

/// Print a timestamped warning for a recoverable problem
///
/// Warnings are always written to stderr, regardless of verbosity, since they
/// mark work that was skipped.
pub fn progress_warn(desc: &str) {
    eprintln!("{} {}", progress_timestamp(&"WARNING".yellow().bold().to_string()), desc);
}

/// Format numbers to readable thousands format
pub fn thousands_format<T>(number: T) -> String
where
    T: std::fmt::Display,
{
    let number = number.to_string();
    if number.len() <= 4 {
        return number;
    }

    number
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<String>>()
        .join(",")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_thousands_format() {
        assert_eq!(thousands_format(12), "12");
        assert_eq!(thousands_format(1234), "1234");
        assert_eq!(thousands_format(12345), "12,345");
        assert_eq!(thousands_format(1234567), "1,234,567");
    }
}
