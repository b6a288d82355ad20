//! Result inspection and URL safety commands.

use console::style;

use super::helpers;
use crate::config::Settings;
use crate::safety::UrlSafetyChecker;
use crate::store::is_result_key;

/// Print the stored harvest result for a URL or result key as JSON.
pub async fn cmd_result(
    settings: &Settings,
    source: &str,
    url_or_key: &str,
) -> anyhow::Result<()> {
    let store = helpers::result_store(settings);
    let result = if is_result_key(url_or_key) {
        store.load_by_key(source, url_or_key)?
    } else {
        store.load(source, url_or_key)?
    };

    match result {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => {
            println!(
                "{} No stored result for {} in '{}'",
                style("!").yellow(),
                url_or_key,
                source
            );
        }
    }

    Ok(())
}

/// Run the safety checker against a URL and print the verdict. Exits
/// non-zero when the URL is blocked so scripts can branch on it.
pub async fn cmd_check(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let checker = UrlSafetyChecker::new(settings.dns_policy);

    match checker.check(url).await {
        Ok(parsed) => {
            println!("{} {} is allowed", style("✓").green(), parsed);
            println!("  DNS policy: {}", settings.dns_policy.as_str());
            Ok(())
        }
        Err(violation) => {
            println!("{} {} is blocked: {}", style("✗").red(), url, violation);
            std::process::exit(1);
        }
    }
}
