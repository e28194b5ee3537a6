use anyhow::{bail, Context, Result};
use clap::Parser;
use property_discovery::discovery::{MapStatus, PagerState, ViewMode};
use property_discovery::filters::{FilterCodec, SortDirection, SortKey, SortOrder, ROOM_MAX};
use property_discovery::models::PropertySummary;
use property_discovery::{DiscoveryConfig, DiscoverySession, HttpListingsApi};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Browse listings the way the marketplace front end does: filters come from
/// a shareable query string, pages are loaded incrementally.
#[derive(Parser, Debug)]
#[command(name = "property-discovery", version)]
struct Args {
    /// Filter query string or full listings URL, e.g. "priceFrom=50000&rooms=2,4"
    #[arg(default_value = "")]
    query: String,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listings API base URL (overrides config and DISCOVERY_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Extra pages to load after the first one
    #[arg(long, default_value_t = 0)]
    pages: u32,

    /// Fetch the full bounded result set for the map instead of the list
    #[arg(long)]
    map: bool,

    /// Sort as key:dir, e.g. price:asc
    #[arg(long)]
    sort: Option<String>,

    /// Save the fetched listings to this JSON file
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_sort(raw: &str) -> Result<SortOrder> {
    let (key, dir) = raw.split_once(':').unwrap_or((raw, "desc"));
    let Some(key) = SortKey::parse(key) else {
        bail!("unknown sort key {:?} (expected price, total_area, date or listing_type)", key);
    };
    let Some(direction) = SortDirection::parse(dir) else {
        bail!("unknown sort direction {:?} (expected asc or desc)", dir);
    };
    Ok(SortOrder::by(key, direction))
}

fn print_listing(index: usize, listing: &PropertySummary) {
    let price = listing
        .price
        .map(|p| p.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!("{}. {} ({})", index + 1, listing.title, price);
    if let (Some(rooms), Some(area)) = (listing.rooms, listing.total_area) {
        println!("   {} rooms, {} m²", rooms, area);
    }
    if let Some(district) = &listing.location.district {
        println!("   District: {}", district);
    }
    println!("   ID: {}", listing.id);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DiscoveryConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DiscoveryConfig::from_env(),
    };
    if let Some(url) = &args.api_url {
        config.api.base_url = url.clone();
    }
    config.validate().context("Invalid configuration")?;

    let sort = args.sort.as_deref().map(parse_sort).transpose()?;

    let api = HttpListingsApi::new(&config.api).context("Failed to create listings client")?;
    info!("🏠 Property Discovery against {}", api.endpoint());

    let mut criteria = FilterCodec::decode(&args.query);
    if let Some(sort) = sort {
        criteria = criteria.with_sort(sort);
    }

    let mut session = DiscoverySession::from_criteria(Arc::new(api), config, criteria);
    if args.map {
        session.set_view_mode(ViewMode::Map);
    }
    session.start();
    session.wait_for_results().await;

    let listings: Vec<PropertySummary> = if args.map {
        let view = session.view();
        if let MapStatus::Failed(reason) = view.map_status() {
            warn!("Map fetch failed: {}", reason);
        }
        info!(
            "🗺️  {} listings for the map ({} with coordinates, {} matching)",
            view.map_items().len(),
            view.map_markers().count(),
            view.map_total()
        );
        if view.is_map_truncated() {
            warn!("Map result is truncated at {} listings", session.config().map_per_page);
        }
        view.map_items().to_vec()
    } else {
        for _ in 0..args.pages {
            if !session.fetch_next() {
                break;
            }
            session.wait_for_results().await;
        }

        let pager = session.pager();
        if pager.state() == PagerState::Error {
            warn!("Listing fetch failed: {}", pager.last_error().unwrap_or("unknown error"));
        }
        info!(
            "✅ Loaded {} of {} listings in {} pages ({:?})",
            pager.item_count(),
            pager.total(),
            pager.pages().len(),
            pager.state()
        );
        pager.items().cloned().collect()
    };

    for (i, listing) in listings.iter().enumerate() {
        print_listing(i, listing);
    }

    session.settle().await;

    println!();
    println!("Rooms:");
    let criteria = session.criteria();
    let facets = session.facets();
    for &value in facets.values() {
        let label = if value == ROOM_MAX {
            format!("{}+", value)
        } else {
            value.to_string()
        };
        let selected = criteria
            .search
            .rooms
            .as_ref()
            .is_some_and(|rooms| rooms.contains(value));
        let marker = if selected { "*" } else { " " };
        println!(" {} {:>3}: {}", marker, label, facets.label(value));
    }
    println!();
    println!("Share: ?{}", session.query_string());

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&listings)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("💾 Saved {} listings to {}", listings.len(), path.display());
    }

    Ok(())
}
