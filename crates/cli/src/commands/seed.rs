//! Seed the database with a small demo catalog.
//!
//! Rows are matched by slug, so running the command twice leaves the
//! catalog unchanged.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use retro_vault_core::{CategoryId, ConsoleId};

use super::{CommandError, connect};

struct SeedConsole {
    name: &'static str,
    slug: &'static str,
    manufacturer: &'static str,
    release_year: i32,
}

struct SeedCategory {
    name: &'static str,
    slug: &'static str,
    description: &'static str,
}

struct SeedGame {
    title: &'static str,
    slug: &'static str,
    console: &'static str,
    categories: &'static [&'static str],
    description: &'static str,
    /// Cents.
    price: i64,
    sale_price: Option<i64>,
    stock: i32,
    condition: &'static str,
    publisher: &'static str,
    release_year: i32,
    featured: bool,
}

const CONSOLES: &[SeedConsole] = &[
    SeedConsole { name: "Nintendo Entertainment System", slug: "nes", manufacturer: "Nintendo", release_year: 1985 },
    SeedConsole { name: "Super Nintendo", slug: "snes", manufacturer: "Nintendo", release_year: 1991 },
    SeedConsole { name: "Sega Genesis", slug: "genesis", manufacturer: "Sega", release_year: 1989 },
    SeedConsole { name: "Nintendo 64", slug: "n64", manufacturer: "Nintendo", release_year: 1996 },
    SeedConsole { name: "PlayStation", slug: "playstation", manufacturer: "Sony", release_year: 1995 },
    SeedConsole { name: "Game Boy", slug: "game-boy", manufacturer: "Nintendo", release_year: 1989 },
];

const CATEGORIES: &[SeedCategory] = &[
    SeedCategory { name: "Platformer", slug: "platformer", description: "Run, jump, repeat" },
    SeedCategory { name: "RPG", slug: "rpg", description: "Parties, quests and grinding" },
    SeedCategory { name: "Action", slug: "action", description: "Fast reflexes required" },
    SeedCategory { name: "Racing", slug: "racing", description: "Karts, cars and hovercraft" },
    SeedCategory { name: "Puzzle", slug: "puzzle", description: "Falling blocks and brain teasers" },
    SeedCategory { name: "Fighting", slug: "fighting", description: "One-on-one tournament brawlers" },
];

const GAMES: &[SeedGame] = &[
    SeedGame {
        title: "Super Mario Bros. 3",
        slug: "super-mario-bros-3-nes",
        console: "nes",
        categories: &["platformer"],
        description: "Eight worlds, the Tanooki suit and a map screen.",
        price: 3999,
        sale_price: None,
        stock: 6,
        condition: "used",
        publisher: "Nintendo",
        release_year: 1990,
        featured: true,
    },
    SeedGame {
        title: "The Legend of Zelda",
        slug: "legend-of-zelda-nes",
        console: "nes",
        categories: &["action", "rpg"],
        description: "The gold cartridge. Battery save tested.",
        price: 4499,
        sale_price: Some(3999),
        stock: 3,
        condition: "used",
        publisher: "Nintendo",
        release_year: 1987,
        featured: false,
    },
    SeedGame {
        title: "Chrono Trigger",
        slug: "chrono-trigger-snes",
        console: "snes",
        categories: &["rpg"],
        description: "Time travel, thirteen endings, one legendary soundtrack.",
        price: 17999,
        sale_price: None,
        stock: 1,
        condition: "used",
        publisher: "Square",
        release_year: 1995,
        featured: true,
    },
    SeedGame {
        title: "Super Metroid",
        slug: "super-metroid-snes",
        console: "snes",
        categories: &["action", "platformer"],
        description: "Samus returns to Zebes.",
        price: 6499,
        sale_price: None,
        stock: 4,
        condition: "used",
        publisher: "Nintendo",
        release_year: 1994,
        featured: false,
    },
    SeedGame {
        title: "Street Fighter II Turbo",
        slug: "street-fighter-ii-turbo-snes",
        console: "snes",
        categories: &["fighting"],
        description: "Hyper-fast mode unlocked from the start.",
        price: 2499,
        sale_price: Some(1999),
        stock: 8,
        condition: "used",
        publisher: "Capcom",
        release_year: 1993,
        featured: false,
    },
    SeedGame {
        title: "Sonic the Hedgehog 2",
        slug: "sonic-the-hedgehog-2-genesis",
        console: "genesis",
        categories: &["platformer"],
        description: "Sonic and Tails versus the Death Egg.",
        price: 1999,
        sale_price: None,
        stock: 12,
        condition: "used",
        publisher: "Sega",
        release_year: 1992,
        featured: true,
    },
    SeedGame {
        title: "Streets of Rage 2",
        slug: "streets-of-rage-2-genesis",
        console: "genesis",
        categories: &["action", "fighting"],
        description: "Side-scrolling brawler with a Yuzo Koshiro score.",
        price: 4999,
        sale_price: None,
        stock: 2,
        condition: "used",
        publisher: "Sega",
        release_year: 1992,
        featured: false,
    },
    SeedGame {
        title: "Mario Kart 64",
        slug: "mario-kart-64-n64",
        console: "n64",
        categories: &["racing"],
        description: "Four-player split screen. Blue shells included.",
        price: 4499,
        sale_price: None,
        stock: 7,
        condition: "used",
        publisher: "Nintendo",
        release_year: 1997,
        featured: true,
    },
    SeedGame {
        title: "The Legend of Zelda: Ocarina of Time",
        slug: "ocarina-of-time-n64",
        console: "n64",
        categories: &["action", "rpg"],
        description: "Link's first adventure in 3D.",
        price: 3999,
        sale_price: None,
        stock: 5,
        condition: "used",
        publisher: "Nintendo",
        release_year: 1998,
        featured: false,
    },
    SeedGame {
        title: "Final Fantasy VII",
        slug: "final-fantasy-vii-playstation",
        console: "playstation",
        categories: &["rpg"],
        description: "Three discs, black label, manual included.",
        price: 3499,
        sale_price: None,
        stock: 4,
        condition: "complete-in-box",
        publisher: "Square",
        release_year: 1997,
        featured: true,
    },
    SeedGame {
        title: "Crash Team Racing",
        slug: "crash-team-racing-playstation",
        console: "playstation",
        categories: &["racing"],
        description: "Kart racing with power slides and boost pads.",
        price: 2999,
        sale_price: Some(2499),
        stock: 0,
        condition: "used",
        publisher: "Sony Computer Entertainment",
        release_year: 1999,
        featured: false,
    },
    SeedGame {
        title: "Tetris",
        slug: "tetris-game-boy",
        console: "game-boy",
        categories: &["puzzle"],
        description: "The pack-in that sold the handheld.",
        price: 1499,
        sale_price: None,
        stock: 15,
        condition: "used",
        publisher: "Nintendo",
        release_year: 1989,
        featured: false,
    },
];

/// Counts of rows the seed inserted.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub consoles: u64,
    pub categories: u64,
    pub games: u64,
}

/// Insert the demo catalog.
///
/// # Errors
///
/// Returns `CommandError` if connecting or any insert fails.
pub async fn run() -> Result<SeedSummary, CommandError> {
    let pool = connect().await?;
    let summary = seed(&pool).await?;

    info!("Seeding complete!");
    info!("  Consoles inserted: {}", summary.consoles);
    info!("  Categories inserted: {}", summary.categories);
    info!("  Games inserted: {}", summary.games);

    Ok(summary)
}

/// Insert every missing console, category and game in one transaction.
///
/// # Errors
///
/// Returns `sqlx::Error` if a query fails.
pub async fn seed(pool: &PgPool) -> Result<SeedSummary, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();

    for console in CONSOLES {
        summary.consoles += sqlx::query(
            r"
            INSERT INTO consoles (name, slug, manufacturer, release_year)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(console.name)
        .bind(console.slug)
        .bind(console.manufacturer)
        .bind(console.release_year)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for category in CATEGORIES {
        summary.categories += sqlx::query(
            r"
            INSERT INTO categories (name, slug, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(category.name)
        .bind(category.slug)
        .bind(category.description)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for game in GAMES {
        if insert_game(&mut tx, game).await? {
            summary.games += 1;
        }
    }

    tx.commit().await?;
    Ok(summary)
}

/// Insert one game and its category links. Returns `false` if the slug exists.
async fn insert_game(
    tx: &mut Transaction<'_, Postgres>,
    game: &SeedGame,
) -> Result<bool, sqlx::Error> {
    let console_id =
        sqlx::query_scalar::<_, ConsoleId>("SELECT id FROM consoles WHERE slug = $1")
            .bind(game.console)
            .fetch_one(&mut **tx)
            .await?;

    let Some(game_id) = sqlx::query_scalar::<_, i32>(
        r"
        INSERT INTO games (console_id, title, slug, description, price, sale_price, stock,
                           condition, publisher, release_year, is_featured)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (slug) DO NOTHING
        RETURNING id
        ",
    )
    .bind(console_id)
    .bind(game.title)
    .bind(game.slug)
    .bind(game.description)
    .bind(Decimal::new(game.price, 2))
    .bind(game.sale_price.map(|cents| Decimal::new(cents, 2)))
    .bind(game.stock)
    .bind(game.condition)
    .bind(game.publisher)
    .bind(game.release_year)
    .bind(game.featured)
    .fetch_optional(&mut **tx)
    .await?
    else {
        return Ok(false);
    };

    for slug in game.categories {
        let category_id =
            sqlx::query_scalar::<_, CategoryId>("SELECT id FROM categories WHERE slug = $1")
                .bind(slug)
                .fetch_one(&mut **tx)
                .await?;

        sqlx::query("INSERT INTO game_categories (game_id, category_id) VALUES ($1, $2)")
            .bind(game_id)
            .bind(category_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_seed_slugs_are_unique() {
        let slugs: HashSet<_> = GAMES.iter().map(|g| g.slug).collect();
        assert_eq!(slugs.len(), GAMES.len());
    }

    #[test]
    fn test_seed_games_reference_known_rows() {
        let consoles: HashSet<_> = CONSOLES.iter().map(|c| c.slug).collect();
        let categories: HashSet<_> = CATEGORIES.iter().map(|c| c.slug).collect();

        for game in GAMES {
            assert!(consoles.contains(game.console), "{}", game.slug);
            assert!(!game.categories.is_empty(), "{}", game.slug);
            assert!(
                game.categories.iter().all(|c| categories.contains(c)),
                "{}",
                game.slug
            );
        }
    }

    #[test]
    fn test_seed_sale_prices_are_discounts() {
        for game in GAMES {
            if let Some(sale) = game.sale_price {
                assert!(sale < game.price, "{}", game.slug);
            }
        }
    }
}
