//! Subcommand implementations.

use crate::cli::{Commands, ConfigCommand};
use crate::context::PanelContext;
use anyhow::{anyhow, bail, Context, Result};
use panel_host::{Attachment, SendError};
use providers::{validate_key, ImageData};
use services::{ConversationStore, ExportFormat, SaveStatus};
use shared::settings::{ProviderKind, Settings};
use std::io::Read;
use std::path::Path;

pub async fn run(ctx: &PanelContext, command: Commands) -> Result<()> {
    match command {
        Commands::New { title } => {
            let mut store = ctx.conversations()?;
            let id = store.create_conversation(&title);
            warn_unsaved(store.last_save());
            println!("{}", id);
        }
        Commands::Send {
            conversation,
            image,
            html,
            text,
        } => send(ctx, conversation, image.as_deref(), html, &text).await?,
        Commands::List => {
            let store = ctx.conversations()?;
            let list = store.get_conversation_list();
            if list.is_empty() {
                println!("No conversations yet.");
            }
            for summary in list {
                println!(
                    "{}  {}  {:>3} msgs  {}",
                    summary.id,
                    summary.updated_at.format("%Y-%m-%d %H:%M"),
                    summary.message_count,
                    summary.title
                );
            }
        }
        Commands::Show { id } => {
            let store = ctx.conversations()?;
            print!("{}", store.export_conversation(&id, ExportFormat::Text)?);
        }
        Commands::Export { id, format } => {
            let store = ctx.conversations()?;
            let out = match id {
                Some(id) => {
                    let format: ExportFormat = format.parse().map_err(|e: String| anyhow!(e))?;
                    store.export_conversation(&id, format)?
                }
                None => store.export_all()?,
            };
            println!("{}", out);
        }
        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let mut store = ctx.conversations()?;
            let added = store.import_conversations(&raw)?;
            warn_unsaved(store.last_save());
            println!("Imported {} conversation(s).", added);
        }
        Commands::Search { query } => {
            let store = ctx.conversations()?;
            let hits = store.search(&query);
            if hits.is_empty() {
                println!("No matches.");
            }
            for hit in hits {
                println!(
                    "{} #{} [{}]: {}",
                    hit.conversation_id, hit.message_index, hit.conversation_title, hit.snippet
                );
            }
        }
        Commands::Delete { id } => {
            let mut store = ctx.conversations()?;
            warn_unsaved(&store.delete_conversation(&id)?);
        }
        Commands::Clear => {
            let mut store = ctx.conversations()?;
            let count = store.len();
            warn_unsaved(&store.clear_all());
            println!("Deleted {} conversation(s).", count);
        }
        Commands::Render { file } => {
            let text = read_input(&file)?;
            println!("{}", render::render_message(&text));
        }
        Commands::Config { command } => match command {
            ConfigCommand::Show => {
                let settings = ctx.settings()?;
                print_settings(settings.get());
            }
            ConfigCommand::Set { key, value } => {
                let mut store = ctx.settings()?;
                let mut settings = store.get().clone();
                apply_setting(&mut settings, &key, &value)?;
                warn_unsaved(&store.save(settings));
                tracing::info!(%key, "setting updated");
            }
        },
        Commands::ValidateKey { provider } => {
            let settings = ctx.settings()?.get().clone();
            let kind = match provider {
                Some(p) => p.parse::<ProviderKind>()?,
                None => settings.provider,
            };
            let key = settings.api_key_for(kind).unwrap_or_default();
            let ok = validate_key(kind.as_str(), key.expose(), settings.base_url.as_deref())
                .await
                .map_err(|e| anyhow!("{}: {}", e.kind().user_message(), e))?;
            if ok {
                println!("{} key is valid.", kind.display_name());
            } else {
                bail!("{} rejected the key", kind.display_name());
            }
        }
    }
    Ok(())
}

async fn send(
    ctx: &PanelContext,
    conversation: Option<String>,
    image: Option<&Path>,
    html: bool,
    text: &str,
) -> Result<()> {
    let attachment = image.map(load_attachment).transpose()?;
    let service = ctx.chat_service()?;
    let id = match conversation {
        Some(id) => id,
        None => latest_or_new(&mut service.store()),
    };

    match service.send(&id, text, attachment).await {
        Ok(reply) => {
            warn_unsaved(&reply.save_status);
            if html {
                println!("{}", reply.html);
            } else {
                println!("{}", reply.message.content);
            }
            Ok(())
        }
        Err(SendError::Dispatch(e)) => {
            Err(anyhow::Error::new(e).context(failure_notice(&service, &id)))
        }
        Err(e) => Err(e.into()),
    }
}

/// The notice the service stored for the failed request.
fn failure_notice(service: &panel_host::ChatService, id: &str) -> String {
    service
        .store()
        .get_conversation(id)
        .and_then(|c| c.messages.last())
        .map(|m| m.content.clone())
        .unwrap_or_else(|| "request failed".to_string())
}

fn latest_or_new(store: &mut ConversationStore) -> String {
    match store.get_conversation_list().into_iter().next() {
        Some(summary) => summary.id,
        None => store.create_conversation(""),
    }
}

fn load_attachment(path: &Path) -> Result<Attachment> {
    let mime = mime_for(path)
        .ok_or_else(|| anyhow!("unsupported image type: {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Attachment {
        file_name,
        image: ImageData::new(mime, bytes),
    })
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn warn_unsaved(status: &SaveStatus) {
    if let SaveStatus::Failed(reason) = status {
        eprintln!("warning: changes were not saved: {}", reason);
    }
}

fn print_settings(settings: &Settings) {
    println!("provider:      {}", settings.provider);
    println!("model:         {}", settings.effective_model());
    println!("temperature:   {}", settings.temperature);
    println!("max_tokens:    {}", settings.max_tokens);
    println!("max_history:   {}", settings.max_history_messages);
    if let Some(url) = &settings.base_url {
        println!("base_url:      {}", url);
    }
    for kind in ProviderKind::ALL {
        let state = match settings.api_key_for(kind) {
            Some(key) if settings.api_keys.contains_key(&kind) => {
                format!("set ({} chars)", key.expose().len())
            }
            Some(_) => "from environment".to_string(),
            None if kind.requires_api_key() => "not set".to_string(),
            None => continue,
        };
        println!("key {:<12} {}", kind.as_str(), state);
    }
}

/// Apply `config set <key> <value>`. `api_key` sets the key for the
/// current provider; `api_key.<provider>` for a named one.
pub fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

    match key {
        "provider" => settings.provider = value.parse()?,
        "model" => settings.model = value.to_string(),
        "temperature" => {
            let t: f32 = value.parse().context("temperature must be a number")?;
            if !(0.0..=2.0).contains(&t) {
                bail!("temperature must be between 0 and 2");
            }
            settings.temperature = t;
        }
        "max_tokens" => {
            settings.max_tokens = value.parse().context("max_tokens must be a positive integer")?
        }
        "max_history" | "max_history_messages" => {
            settings.max_history_messages =
                value.parse().context("max_history must be a non-negative integer")?
        }
        "base_url" => settings.base_url = optional(value),
        "system_prompt" => settings.system_prompt = optional(value),
        "api_key" => {
            let provider = settings.provider;
            settings.set_api_key(provider, value);
        }
        other => match other.strip_prefix("api_key.") {
            Some(provider) => settings.set_api_key(provider.parse()?, value),
            None => bail!("unknown setting: {}", other),
        },
    }
    Ok(())
}
