use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Language::Table)
                    .if_not_exists()
                    .col(pk_auto(Language::Id))
                    .col(string(Language::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Genre::Table)
                    .if_not_exists()
                    .col(pk_auto(Genre::Id))
                    .col(string(Genre::Name))
                    .col(string(Genre::NameKey))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movie::Table)
                    .if_not_exists()
                    .col(pk_auto(Movie::Id))
                    .col(string(Movie::Title))
                    .col(string(Movie::TitleKey))
                    .col(integer(Movie::GenreId))
                    .col(integer(Movie::LanguageId))
                    .col(integer(Movie::OscarCount))
                    .col(string(Movie::ReleaseDate))
                    .col(integer_null(Movie::Duration))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_genre")
                            .from(Movie::Table, Movie::GenreId)
                            .to(Genre::Table, Genre::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_movie_language")
                            .from(Movie::Table, Movie::LanguageId)
                            .to(Language::Table, Language::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_genre_id")
                    .table(Movie::Table)
                    .col(Movie::GenreId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movie_language_id")
                    .table(Movie::Table)
                    .col(Movie::LanguageId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Movie::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Genre::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Language::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    Id,
    Title,
    TitleKey,
    GenreId,
    LanguageId,
    OscarCount,
    ReleaseDate,
    Duration,
}

#[derive(DeriveIden)]
enum Genre {
    Table,
    Id,
    Name,
    NameKey,
}

#[derive(DeriveIden)]
enum Language {
    Table,
    Id,
    Name,
}
