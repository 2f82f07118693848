/*!

This is the long-form manual for `tally_core` and `geotally`.

## Input formats

Each candidate and election year comes with two files. Both are comma-separated
values (UTF-8, first line is the header). Excel workbooks (`.xlsx`) with the same
columns in their first worksheet are also accepted.

Header names are matched without regard to case, accents or extra spaces:
`Seção`, `Secao` and `SEÇÃO` are the same column. Unknown columns are ignored.

### Votes per section

| Column                                | Content                           |
|---------------------------------------|-----------------------------------|
| `Zona`                                | electoral zone                    |
| `Seção`                               | section within the zone           |
| `Seções Agregadas`                    | sections merged into this one     |
| `Votos`                               | votes of the candidate            |
| `Local de Votação`                    | name of the polling place         |
| `Endereço do Local de Votação`        | address of the polling place      |
| `Bairro`                              | neighborhood of the polling place |

### Votes per neighborhood

| Column            | Content                          |
|-------------------|----------------------------------|
| `Bairro`          | neighborhood                     |
| `Votos`           | votes of the candidate           |
| `% Votos Obtidos` | share of the votes, `12,5` or `12.5%` |

Numbers that cannot be read are counted as zero. Every such replacement is
reported in the upload summary with its line and column, so that the file can
be fixed and uploaded again.

## Uploading

```bash
geotally upload --candidate 3 --year 2024 --city Fortaleza \
  --sections secoes_2024.csv --neighborhoods bairros_2024.csv
```

An upload replaces all the rows of that candidate and year. Uploading the very
same files twice for the same city is detected and skipped, unless `--force`
is given.

## Regionals

A regional groups the neighborhoods of a city. Assigning a neighborhood:

```bash
geotally regional add --name "SER II" --city Fortaleza
geotally geo assign --city Fortaleza --neighborhood Meireles --regional 7
geotally geo clear --city Fortaleza --neighborhood Meireles
```

Neighborhoods are identified by their name within a city, after the same
normalization as the headers.

`geotally regional update 7 --name "Regional 2" --code R2` renames a regional.
`geotally regional toggle 7` deactivates it: its neighborhoods stay assigned,
but no new neighborhood can be assigned to it.

## Dashboards

The filters of a dashboard are written as a query string:

```bash
geotally analytics --candidate 3 --query 'year=2024&cidades=Fortaleza&minVotos=10&topN=5'
```

| Key         | Meaning                                   | Default     |
|-------------|-------------------------------------------|-------------|
| `year`      | election year                             | latest year |
| `cidades`   | comma-separated cities                    | all         |
| `regionais` | comma-separated regional ids              | all         |
| `zona`      | one zone                                  | all         |
| `bairro`    | one neighborhood                          | all         |
| `q`         | text searched in zone, section, neighborhood | none     |
| `minVotos`  | minimum votes of a ranking entry          | 0           |
| `topN`      | length of the rankings                    | 10          |

`zona` only restricts the section views: the neighborhood files have no zone.
The timeline follows the cities, regionals and neighborhood only.

*/
