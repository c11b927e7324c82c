use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use apikit::auth::{
    derive_api_key, generate_passphrase, signature, AuthorizationService, LogNotifier,
};
use apikit::domain::{token_hint, AuthorizationRecord};
use apikit::infra::CredentialStore;

fn print_help() {
    eprintln!(
        "\
apikit-admin

USAGE:
  apikit-admin <command> [options]

COMMANDS:
  list                            List stored authorization records
  show                            Print one record as JSON
  sign                            Compute the signature for an api key and token
  keygen                          Derive an api key for an account
  invalidate                      Move a record into the terminal invalid state

COMMON OPTIONS:
  --root <dir>                    Credential root (defaults to env CREDENTIAL_ROOT,
                                  then $CONFIG_LOCATION/cred, then ./.config/cred)

show OPTIONS:
  --token <token>                 Look up by token
  --realm <realm>                 Look up by primary key (with --account-id)
  --account-id <id>

sign OPTIONS:
  --api-key <key>                 (required)
  --token <token>                 (required)

keygen OPTIONS:
  --realm <realm>                 (required)
  --account-id <id>               (required)
  --passphrase <words>            (optional; generated when omitted)

invalidate OPTIONS:
  --token <token>                 (required)

A running server keeps its own index: restart it (or trigger a reload) after
invalidating records with this tool.
"
    );
}

fn resolve_root(root: Option<String>) -> anyhow::Result<PathBuf> {
    if let Some(root) = root {
        return Ok(PathBuf::from(root));
    }
    if let Ok(root) = std::env::var("CREDENTIAL_ROOT") {
        if root.trim().is_empty() {
            anyhow::bail!("CREDENTIAL_ROOT is empty (in-memory); pass --root");
        }
        return Ok(PathBuf::from(root));
    }
    let location = std::env::var("CONFIG_LOCATION").unwrap_or_else(|_| "./.config".to_string());
    Ok(PathBuf::from(location).join("cred"))
}

fn open_store(root: Option<String>) -> anyhow::Result<CredentialStore> {
    let root = resolve_root(root)?;
    if !root.is_dir() {
        anyhow::bail!("credential root {} does not exist", root.display());
    }
    let (store, report) = CredentialStore::open(&root);
    for (path, e) in &report.errors {
        eprintln!("warning: skipped {}: {e}", path.display());
    }
    Ok(store)
}

fn required(value: Option<String>, flag: &str) -> anyhow::Result<String> {
    value.ok_or_else(|| anyhow::anyhow!("{flag} is required"))
}

fn value_of(args: &mut VecDeque<String>, flag: &str) -> anyhow::Result<String> {
    args.pop_front()
        .ok_or_else(|| anyhow::anyhow!("missing value for {flag}"))
}

fn masked(record: &AuthorizationRecord) -> AuthorizationRecord {
    let mut record = record.clone();
    if !record.api_key.is_empty() {
        record.api_key = format!("{}...", token_hint(&record.api_key));
    }
    record
}

fn main() -> anyhow::Result<()> {
    let mut args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(command) = args.pop_front() else {
        print_help();
        return Ok(());
    };

    if matches!(command.as_str(), "-h" | "--help" | "help") {
        print_help();
        return Ok(());
    }

    match command.as_str() {
        "list" => {
            let mut root: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--root" => root = Some(value_of(&mut args, "--root")?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let store = open_store(root)?;
            for record in store.records() {
                let scopes: Vec<&str> =
                    record.effective_scopes().iter().map(String::as_str).collect();
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.primary_key(),
                    record.state,
                    token_hint(record.token()),
                    record.credentials.expires_at,
                    scopes.join(",")
                );
            }
            eprintln!("{} record(s)", store.len());
            Ok(())
        }
        "show" => {
            let mut root: Option<String> = None;
            let mut token: Option<String> = None;
            let mut realm: Option<String> = None;
            let mut account_id: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--root" => root = Some(value_of(&mut args, "--root")?),
                    "--token" => token = Some(value_of(&mut args, "--token")?),
                    "--realm" => realm = Some(value_of(&mut args, "--realm")?),
                    "--account-id" => account_id = Some(value_of(&mut args, "--account-id")?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let store = open_store(root)?;
            let record = match (token, realm, account_id) {
                (Some(token), None, None) => store.lookup_by_token(&token)?,
                (None, Some(realm), Some(account_id)) => store.lookup_by_key(&realm, &account_id),
                _ => anyhow::bail!("pass either --token or --realm with --account-id"),
            };
            let record = record.ok_or_else(|| anyhow::anyhow!("no such record"))?;
            println!("{}", serde_json::to_string_pretty(&masked(&record))?);
            Ok(())
        }
        "sign" => {
            let mut api_key: Option<String> = None;
            let mut token: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--api-key" => api_key = Some(value_of(&mut args, "--api-key")?),
                    "--token" => token = Some(value_of(&mut args, "--token")?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let api_key = required(api_key, "--api-key")?;
            let token = required(token, "--token")?;
            println!("{}", signature(&api_key, &token));
            Ok(())
        }
        "keygen" => {
            let mut realm: Option<String> = None;
            let mut account_id: Option<String> = None;
            let mut passphrase: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--realm" => realm = Some(value_of(&mut args, "--realm")?),
                    "--account-id" => account_id = Some(value_of(&mut args, "--account-id")?),
                    "--passphrase" => passphrase = Some(value_of(&mut args, "--passphrase")?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let realm = required(realm, "--realm")?;
            let account_id = required(account_id, "--account-id")?;
            let passphrase = match passphrase {
                Some(p) => p,
                None => {
                    let p = generate_passphrase();
                    eprintln!("passphrase: {p}");
                    p
                }
            };
            println!("{}", derive_api_key(&realm, &account_id, &passphrase));
            Ok(())
        }
        "invalidate" => {
            let mut root: Option<String> = None;
            let mut token: Option<String> = None;
            while let Some(arg) = args.pop_front() {
                match arg.as_str() {
                    "--root" => root = Some(value_of(&mut args, "--root")?),
                    "--token" => token = Some(value_of(&mut args, "--token")?),
                    "-h" | "--help" => {
                        print_help();
                        return Ok(());
                    }
                    other => anyhow::bail!("unexpected argument: {other}"),
                }
            }

            let token = required(token, "--token")?;
            let store = Arc::new(open_store(root)?);
            let service = AuthorizationService::new(store, Arc::new(LogNotifier));
            service.invalidate(&token)?;
            println!("ok: {} invalidated", token_hint(&token));
            Ok(())
        }
        other => {
            print_help();
            anyhow::bail!("unknown command: {other}")
        }
    }
}
