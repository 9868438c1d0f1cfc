use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// `title_key` / `name_key` hold the Unicode-lowercased value, so a plain
/// unique index gives case-insensitive uniqueness beyond ASCII.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_movie_title_key_unique")
                    .table(Movie::Table)
                    .col(Movie::TitleKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_genre_name_key_unique")
                    .table(Genre::Table)
                    .col(Genre::NameKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop().name("idx_genre_name_key_unique").table(Genre::Table).to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop().name("idx_movie_title_key_unique").table(Movie::Table).to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movie {
    Table,
    TitleKey,
}

#[derive(DeriveIden)]
enum Genre {
    Table,
    NameKey,
}
